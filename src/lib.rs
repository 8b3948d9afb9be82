//! # backman
//!
//! Runs configured backup targets as `tar` archives, optionally encrypted with `gpg`.
//!
//! ## Features
//!
//! - **INI Configuration**: One `[target]` section per backup job
//! - **Compression**: Any program `tar -I` accepts, `xz` by default
//! - **Encryption**: Symmetric `gpg` with the passphrase handed over a private pipe
//! - **Privilege Elevation**: Archives run through `sudo` (or any configured program)
//! - **Hooks**: Shell commands before and after each target, run in parallel
//!
//! ## Quick Start
//!
//! ```no_run
//! use backman::backup::driver::{run, DriverOptions};
//! use backman::backup::prompt::InteractivePrompt;
//!
//! let options = DriverOptions::builder()
//!     .config("/etc/backman.ini")
//!     .targets(vec!["all".to_owned()])
//!     .build();
//! run(&options, &InteractivePrompt)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
