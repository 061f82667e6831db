// Candidate signature framing inside scripts.
//
// A signature element in a script carries its sighash selector as a single
// trailing byte, after the (self-describing) signature serialization. This
// holds for both regimes: legacy elements are the 64-byte compact signature
// plus the sighash byte; PQ elements are the tag-prefixed signature plus
// the sighash byte.

use cutover_core::sighash::SighashType;

/// Append the sighash byte to a serialized signature.
pub fn attach_sighash(mut sig: Vec<u8>, sighash: SighashType) -> Vec<u8> {
    sig.push(sighash.to_byte());
    sig
}

/// Split a script signature element into (signature bytes, sighash type).
/// `None` for an empty element or an unknown sighash byte: the caller
/// treats that as verification failure, not a script error.
pub fn split_sighash(element: &[u8]) -> Option<(&[u8], SighashType)> {
    let (&last, body) = element.split_last()?;
    let sighash = SighashType::from_byte(last)?;
    Some((body, sighash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutover_core::sighash::SighashMode;

    #[test]
    fn attach_split_round_trip() {
        let st = SighashType {
            mode: SighashMode::Single,
            anyone_can_pay: true,
        };
        let framed = attach_sighash(vec![1, 2, 3], st);
        let (body, parsed) = split_sighash(&framed).unwrap();
        assert_eq!(body, &[1, 2, 3]);
        assert_eq!(parsed, st);
    }

    #[test]
    fn empty_and_unknown_selector_rejected() {
        assert!(split_sighash(&[]).is_none());
        assert!(split_sighash(&[1, 2, 0x00]).is_none());
        assert!(split_sighash(&[1, 2, 0x7f]).is_none());
    }
}
