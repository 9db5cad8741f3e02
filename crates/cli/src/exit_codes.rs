//! CLI Exit Code Registry
//!
//! Single source of truth for all CLI exit codes. Exit codes are part of the
//! shell contract; scripts rely on them.
//!
//! | Code | Description                                      |
//! |------|--------------------------------------------------|
//! | 0    | Success                                          |
//! | 2    | CLI usage error (bad args, handled by clap)      |
//! | 3    | Findings present and `--strict` was set          |
//! | 4    | Invalid config (parse or validation failure)     |
//! | 5    | Runtime failure (IO, CSV, missing column)        |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Findings exist and the caller asked for a nonzero exit (`--strict`).
pub const EXIT_FINDINGS: u8 = 3;

/// Config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 4;

/// Runtime failure: unreadable file, CSV parse error, missing column.
pub const EXIT_RUNTIME: u8 = 5;
