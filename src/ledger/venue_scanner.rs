//! Venue detection for observed transactions.
//!
//! Matches program ids of outer instructions first, then inner (CPI)
//! instructions, against a registry of known swap programs. Aggregators such
//! as Jupiter sit in the outer instruction and route through AMMs via CPI, so
//! the outer-first order attributes a routed trade to the aggregator.

use {
    crate::ledger::rpc_types::{UiInnerInstructions, UiMessage},
    std::collections::HashMap,
};

pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

/// Venue name for transactions that only move tokens
pub const TRANSFER_VENUE: &str = "Transfer";
pub const UNKNOWN_VENUE: &str = "Unknown";

/// Programs that accompany plain transfers without making them a trade
const INFRASTRUCTURE_PROGRAMS: &[&str] = &[
    "ComputeBudget111111111111111111111111111111",
    "11111111111111111111111111111111",
    "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL",
    "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr",
    "Memo1UhkJRfHyvLMcVucJwxXeuD728EqVDDwQDxFMNo",
];

const KNOWN_VENUES: &[(&str, &str)] = &[
    ("JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4", "Jupiter"),
    ("JUP4Fb2cqiRUcaTHdrPC8h2gNsA2ETXiPDD33WcGuJB", "Jupiter"),
    ("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8", "Raydium"),
    ("CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK", "Raydium"),
    ("CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C", "Raydium"),
    ("whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc", "Orca"),
    ("LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo", "Meteora"),
    ("Eo7WjKq67rjJQSZxS6z3YkapzY3eMj6Xy8X5EQVn5UaB", "Meteora"),
    ("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P", "PumpFun"),
    ("pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA", "PumpSwap"),
    ("MoonCVVNZFSYkqNXP6bxHLPL6QQJiMagDL3qcqUQTrG", "Moonshot"),
    ("LanMV9sAd7wArD4vJFi2qDdfnVhFxYSUg6eADduJ3uj", "BonkSwap"),
];

/// Where the venue program was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionPath {
    Outer { index: usize },
    Inner { outer_index: usize, inner_index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueMatch {
    pub program_id: String,
    pub venue: &'static str,
    pub instruction_path: InstructionPath,
}

#[derive(Clone)]
pub struct VenueScanner {
    venues: HashMap<&'static str, &'static str>,
}

impl VenueScanner {
    pub fn new() -> Self {
        let venues: HashMap<_, _> = KNOWN_VENUES.iter().copied().collect();
        log::debug!("📋 VenueScanner initialized with {} programs", venues.len());
        Self { venues }
    }

    pub fn scan(&self, message: &UiMessage, inner: Option<&[UiInnerInstructions]>) -> Option<VenueMatch> {
        for (index, instruction) in message.instructions.iter().enumerate() {
            if let Some(venue) = self.venues.get(instruction.program_id.as_str()) {
                return Some(VenueMatch {
                    program_id: instruction.program_id.clone(),
                    venue: *venue,
                    instruction_path: InstructionPath::Outer { index },
                });
            }
        }

        for group in inner.unwrap_or_default() {
            for (inner_index, instruction) in group.instructions.iter().enumerate() {
                if let Some(venue) = self.venues.get(instruction.program_id.as_str()) {
                    return Some(VenueMatch {
                        program_id: instruction.program_id.clone(),
                        venue: *venue,
                        instruction_path: InstructionPath::Inner {
                            outer_index: group.index as usize,
                            inner_index,
                        },
                    });
                }
            }
        }

        None
    }

    /// Venue name for a transaction: the matched program, `Transfer` when the
    /// token program is the only program invoked besides infrastructure
    /// (compute budget, system, ATA, memo), `Unknown` otherwise.
    pub fn venue_name(&self, message: &UiMessage, inner: Option<&[UiInnerInstructions]>) -> String {
        if let Some(found) = self.scan(message, inner) {
            return found.venue.to_string();
        }

        let mut touches_token_program = false;
        let programs = message
            .instructions
            .iter()
            .chain(inner.unwrap_or_default().iter().flat_map(|g| g.instructions.iter()))
            .map(|ix| ix.program_id.as_str());

        for program_id in programs {
            if program_id == TOKEN_PROGRAM_ID || program_id == TOKEN_2022_PROGRAM_ID {
                touches_token_program = true;
            } else if !INFRASTRUCTURE_PROGRAMS.contains(&program_id) {
                return UNKNOWN_VENUE.to_string();
            }
        }

        if touches_token_program {
            TRANSFER_VENUE.to_string()
        } else {
            UNKNOWN_VENUE.to_string()
        }
    }
}

impl Default for VenueScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(programs: &[&str]) -> UiMessage {
        let instructions: Vec<_> = programs.iter().map(|p| json!({ "programId": p })).collect();
        serde_json::from_value(json!({
            "accountKeys": [{ "pubkey": "payer", "signer": true, "writable": true }],
            "instructions": instructions
        }))
        .unwrap()
    }

    fn inner(index: u8, programs: &[&str]) -> UiInnerInstructions {
        let instructions: Vec<_> = programs.iter().map(|p| json!({ "programId": p })).collect();
        serde_json::from_value(json!({ "index": index, "instructions": instructions })).unwrap()
    }

    #[test]
    fn test_outer_match_wins_over_inner() {
        let scanner = VenueScanner::new();
        let msg = message(&[
            "ComputeBudget111111111111111111111111111111",
            "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4",
        ]);
        let inner = vec![inner(1, &["whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc"])];

        let found = scanner.scan(&msg, Some(inner.as_slice())).unwrap();
        assert_eq!(found.venue, "Jupiter");
        assert_eq!(found.instruction_path, InstructionPath::Outer { index: 1 });
    }

    #[test]
    fn test_inner_match() {
        let scanner = VenueScanner::new();
        let msg = message(&["SomeRouter1111111111111111111111111111111111"]);
        let inner = vec![inner(0, &[TOKEN_PROGRAM_ID, "pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA"])];

        let found = scanner.scan(&msg, Some(inner.as_slice())).unwrap();
        assert_eq!(found.venue, "PumpSwap");
        assert_eq!(
            found.instruction_path,
            InstructionPath::Inner { outer_index: 0, inner_index: 1 }
        );
    }

    #[test]
    fn test_unlisted_program_with_token_cpi_is_unknown() {
        let scanner = VenueScanner::new();
        let msg = message(&["SomeUnknownDex11111111111111111111111111111"]);
        let inner = vec![inner(0, &[TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID])];

        assert_eq!(scanner.venue_name(&msg, Some(inner.as_slice())), UNKNOWN_VENUE);
    }

    #[test]
    fn test_transfer_alongside_infrastructure_programs() {
        let scanner = VenueScanner::new();
        let msg = message(&[
            "ComputeBudget111111111111111111111111111111",
            "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL",
            TOKEN_2022_PROGRAM_ID,
        ]);
        let inner = vec![inner(1, &["11111111111111111111111111111111", TOKEN_PROGRAM_ID])];

        assert_eq!(scanner.venue_name(&msg, Some(inner.as_slice())), TRANSFER_VENUE);
    }

    #[test]
    fn test_fallback_names() {
        let scanner = VenueScanner::new();
        assert_eq!(scanner.venue_name(&message(&[TOKEN_PROGRAM_ID]), None), TRANSFER_VENUE);
        assert_eq!(
            scanner.venue_name(&message(&["11111111111111111111111111111111"]), None),
            UNKNOWN_VENUE
        );
    }
}
