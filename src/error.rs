use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions that abort a conversion run. Per-fragment problems
/// (missing headword, empty body) are recovered by omission and counted in
/// the run statistics instead.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("could not open {}: {source}", path.display())]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no <idx:entry> tag found: not an unpacked dictionary file")]
    NotADictionary,
}
