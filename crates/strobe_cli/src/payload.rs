//! Payload strings given on the command line.

use strobe_handshake::{Flit, Payload};

/// Flits sent when no `--payload` is given: two lanes, nine flits.
pub const DEFAULT_PAIRS: [(u128, u128); 9] = [
    (0, 1),
    (1, 0),
    (1, 0),
    (0, 1),
    (1, 1),
    (1, 1),
    (0, 1),
    (0, 0),
    (0, 1),
];

/// Returns the default payload.
pub fn default_payload() -> Payload {
    Payload::from(DEFAULT_PAIRS)
}

/// Parses `"a,b;c,d"` into flits. Values are decimal or `0x`-prefixed hex.
pub fn parse_payload(text: &str) -> Result<Payload, String> {
    let mut flits = Vec::new();
    for (index, chunk) in text.split(';').enumerate() {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            return Err(format!("flit {index} is empty"));
        }
        let values = chunk
            .split(',')
            .map(|v| parse_value(v.trim()).map_err(|e| format!("flit {index}: {e}")))
            .collect::<Result<Vec<_>, _>>()?;
        flits.push(Flit::new(values));
    }
    if let Some(first) = flits.first() {
        let arity = first.arity();
        if let Some(pos) = flits.iter().position(|f| f.arity() != arity) {
            return Err(format!(
                "flit {pos} has {} values, expected {arity}",
                flits[pos].arity()
            ));
        }
    }
    Ok(flits.into_iter().collect())
}

fn parse_value(text: &str) -> Result<u128, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u128::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| format!("invalid value '{text}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_payload_has_nine_pairs() {
        let payload = default_payload();
        assert_eq!(payload.len(), 9);
        assert!(payload.iter().all(|f| f.arity() == 2));
        assert_eq!(payload.flits()[7].values(), &[0, 0]);
    }

    #[test]
    fn parse_pairs() {
        let payload = parse_payload("0,1; 1,0 ;0x3,2").unwrap();
        let values: Vec<&[u128]> = payload.iter().map(Flit::values).collect();
        assert_eq!(values, vec![&[0, 1][..], &[1, 0][..], &[3, 2][..]]);
    }

    #[test]
    fn parse_scalars() {
        let payload = parse_payload("5;6;7").unwrap();
        assert_eq!(payload.len(), 3);
        assert!(payload.iter().all(|f| f.arity() == 1));
    }

    #[test]
    fn ragged_payload_is_rejected() {
        let err = parse_payload("1,2;3").unwrap_err();
        assert!(err.contains("flit 1 has 1 values, expected 2"));
    }

    #[test]
    fn bad_value_is_rejected() {
        assert!(parse_payload("1,x").unwrap_err().contains("invalid value 'x'"));
        assert!(parse_payload("1;;2").unwrap_err().contains("flit 1 is empty"));
    }
}
