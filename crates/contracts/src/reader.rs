//! PayloadReader trait - remote media acquisition

use std::path::{Path, PathBuf};

use crate::{ContractError, PayloadRef};

/// Payload reading trait
///
/// Materializes a remote payload as a local file inside `dir`.
#[trait_variant::make(PayloadReader: Send)]
pub trait LocalPayloadReader {
    /// Reader name (used for logging)
    fn name(&self) -> &str;

    /// Fetch the payload into `dir` and return the created file's path
    ///
    /// `stem` is a unique, filesystem-safe base name chosen by the caller;
    /// the reader may append an extension.
    ///
    /// # Errors
    /// Returns `ContractError::PayloadFetch` (or IO) when nothing was written
    async fn fetch(
        &self,
        payload: &PayloadRef,
        dir: &Path,
        stem: &str,
    ) -> Result<PathBuf, ContractError>;
}
