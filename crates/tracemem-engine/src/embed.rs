use async_trait::async_trait;

/// Boxed error returned by embedder implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Text → fixed-dimension dense vector.
///
/// The embedding provider is an external collaborator; the engine assumes
/// idempotent output for the same text and a dimension that stays fixed
/// for a database's lifetime.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimension of every vector this embedder produces.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, BoxError>;
}
