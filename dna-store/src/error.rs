use thiserror::Error;

/// Errors raised by the Storage Engine (§4.6).
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StoreError {
    #[error("store schema version {store} is newer than binary schema version {binary}")]
    SchemaVersionTooNew { store: u32, binary: u32 },

    #[error("label references bar {0:?} which is not accepted in the store")]
    LabelWithoutAcceptedBar(dna_instrument::BarKey),
}
