//! Minimal RFC 3161 encoding: a fixed-layout `TimeStampReq` for a SHA-256
//! imprint and just enough reply decoding to read the PKI status.

/// DER of `TimeStampReq { version 1, messageImprint { sha256, <digest> }, certReq TRUE }`
/// up to the 32 digest bytes.
const QUERY_PREFIX: [u8; 24] = [
    0x30, 0x39, // TimeStampReq SEQUENCE
    0x02, 0x01, 0x01, // version INTEGER 1
    0x30, 0x31, // MessageImprint SEQUENCE
    0x30, 0x0d, // AlgorithmIdentifier SEQUENCE
    0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01, // OID sha256
    0x05, 0x00, // NULL parameters
    0x04, 0x20, // hashedMessage OCTET STRING (32)
];
const QUERY_SUFFIX: [u8; 3] = [0x01, 0x01, 0xff]; // certReq BOOLEAN TRUE

const TAG_SEQUENCE: u8 = 0x30;
const TAG_INTEGER: u8 = 0x02;

pub fn timestamp_query(digest: &[u8; 32]) -> Vec<u8> {
    let mut query = Vec::with_capacity(QUERY_PREFIX.len() + digest.len() + QUERY_SUFFIX.len());
    query.extend_from_slice(&QUERY_PREFIX);
    query.extend_from_slice(digest);
    query.extend_from_slice(&QUERY_SUFFIX);
    query
}

/// `PKIStatus` values from RFC 3161.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkiStatus {
    Granted,
    GrantedWithMods,
    Other(u8),
}

impl PkiStatus {
    pub fn is_granted(self) -> bool {
        matches!(self, PkiStatus::Granted | PkiStatus::GrantedWithMods)
    }

    pub fn code(self) -> u8 {
        match self {
            PkiStatus::Granted => 0,
            PkiStatus::GrantedWithMods => 1,
            PkiStatus::Other(code) => code,
        }
    }
}

/// Reads `TimeStampResp.status.status`.
pub fn parse_reply_status(reply: &[u8]) -> Option<PkiStatus> {
    let (resp, _) = read_tlv(reply, TAG_SEQUENCE)?;
    let (status_info, _) = read_tlv(resp, TAG_SEQUENCE)?;
    let (status, _) = read_tlv(status_info, TAG_INTEGER)?;
    match status {
        [0] => Some(PkiStatus::Granted),
        [1] => Some(PkiStatus::GrantedWithMods),
        [code] => Some(PkiStatus::Other(*code)),
        _ => None,
    }
}

/// Returns the value of the element at the start of `input` and the rest.
fn read_tlv(input: &[u8], tag: u8) -> Option<(&[u8], &[u8])> {
    let (&found, rest) = input.split_first()?;
    if found != tag {
        return None;
    }
    let (&first, rest) = rest.split_first()?;
    let (len, rest) = if first < 0x80 {
        (usize::from(first), rest)
    } else {
        let count = usize::from(first & 0x7f);
        if count == 0 || count > 4 || rest.len() < count {
            return None;
        }
        let len = rest[..count]
            .iter()
            .fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte));
        (len, &rest[count..])
    };
    if rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}

#[cfg(test)]
mod tests {
    use super::{parse_reply_status, timestamp_query, PkiStatus};

    #[test]
    fn query_has_consistent_lengths() {
        let query = timestamp_query(&[0xab; 32]);
        assert_eq!(query.len(), 59);
        assert_eq!(usize::from(query[1]), query.len() - 2);
        assert_eq!(&query[24..56], &[0xab; 32]);
        assert_eq!(&query[56..], &[0x01, 0x01, 0xff]);
    }

    #[test]
    fn granted_status_is_read() {
        // TimeStampResp { status { 0 } } without a token.
        let reply = [0x30, 0x05, 0x30, 0x03, 0x02, 0x01, 0x00];
        assert_eq!(parse_reply_status(&reply), Some(PkiStatus::Granted));
    }

    #[test]
    fn rejection_status_is_read_with_long_form_length() {
        let reply = [0x30, 0x81, 0x05, 0x30, 0x03, 0x02, 0x01, 0x02];
        let status = parse_reply_status(&reply).unwrap();
        assert!(!status.is_granted());
        assert_eq!(status.code(), 2);
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_reply_status(b"<html>"), None);
        assert_eq!(parse_reply_status(&[0x30, 0x10, 0x30]), None);
        assert_eq!(parse_reply_status(&[]), None);
    }
}
