//! Sequence-ID generation.
//!
//! IDs are three base-1000 groups, zero-padded to 3 digits and joined by
//! `-` (`000-000-001`). Once the numeric space overflows, a single uppercase
//! letter prefix is added: `999-999-999` increments to `A-000-000-000`, and a
//! carry out of the leftmost group advances the letter. Letter `Z` overflow
//! wraps back to `A`, which silently reuses the ID space — a documented
//! limitation, reproduced as-is.
//!
//! The generator is a pure function of the previous ID string; it holds no
//! state.

/// ID of the genesis block, the start of the sequence.
pub const GENESIS_ID: &str = "000-000-000";

/// Errors from sequence-ID parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("invalid sequence ID format: {0:?}")]
    Format(String),
}

/// Compute the successor of a sequence ID.
pub fn next_id(id: &str) -> Result<String, IdError> {
    let parts: Vec<&str> = id.split('-').collect();
    match parts.as_slice() {
        [g1, g2, g3] => {
            let groups = [
                parse_group(g1, id)?,
                parse_group(g2, id)?,
                parse_group(g3, id)?,
            ];
            Ok(increment(None, groups))
        }
        [letter, g1, g2, g3] => {
            let letter = parse_letter(letter, id)?;
            let groups = [
                parse_group(g1, id)?,
                parse_group(g2, id)?,
                parse_group(g3, id)?,
            ];
            Ok(increment(Some(letter), groups))
        }
        _ => Err(IdError::Format(id.to_string())),
    }
}

fn parse_group(part: &str, id: &str) -> Result<u32, IdError> {
    if part.len() != 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IdError::Format(id.to_string()));
    }
    part.parse().map_err(|_| IdError::Format(id.to_string()))
}

fn parse_letter(part: &str, id: &str) -> Result<char, IdError> {
    match part.as_bytes() {
        [b] if b.is_ascii_uppercase() => Ok(*b as char),
        _ => Err(IdError::Format(id.to_string())),
    }
}

fn increment(letter: Option<char>, groups: [u32; 3]) -> String {
    let [mut g1, mut g2, mut g3] = groups;

    g3 += 1;
    if g3 == 1000 {
        g3 = 0;
        g2 += 1;
    }
    if g2 == 1000 {
        g2 = 0;
        g1 += 1;
    }
    if g1 == 1000 {
        g1 = 0;
        // An absent letter behaves as if starting before 'A'; 'Z' wraps.
        let next_letter = match letter {
            None | Some('Z') => 'A',
            Some(c) => (c as u8 + 1) as char,
        };
        return format!("{next_letter}-{g1:03}-{g2:03}-{g3:03}");
    }

    match letter {
        Some(c) => format!("{c}-{g1:03}-{g2:03}-{g3:03}"),
        None => format!("{g1:03}-{g2:03}-{g3:03}"),
    }
}
