use tracksense::analysis::{EMBEDDING_DIM, Embedding, EmbeddingOracle, OracleError};

/// Labels windows by index and embeds each window as its mean level.
///
/// Windows at and past `switch_at` get `after`, earlier ones `before`.
pub struct IndexedOracle {
    pub before: &'static str,
    pub after: &'static str,
    pub switch_at: usize,
    pub embedded: usize,
}

impl IndexedOracle {
    pub fn new(before: &'static str, after: &'static str, switch_at: usize) -> Self {
        Self {
            before,
            after,
            switch_at,
            embedded: 0,
        }
    }
}

impl EmbeddingOracle for IndexedOracle {
    fn embed(&mut self, window: &[f32]) -> Result<Embedding, OracleError> {
        let index = self.embedded;
        self.embedded += 1;
        let mut values = vec![0.0; EMBEDDING_DIM];
        values[0] = index as f32;
        values[1] = window.iter().sum::<f32>() / window.len() as f32;
        Embedding::new(values)
    }

    fn classify(&mut self, embedding: &Embedding) -> Result<String, OracleError> {
        let index = embedding.as_slice()[0] as usize;
        let label = if index < self.switch_at {
            self.before
        } else {
            self.after
        };
        Ok(label.to_string())
    }
}

/// Embeds a window as a two-component direction derived from its level, so
/// tracks at similar levels end up with similar fingerprints.
pub struct LevelOracle;

impl EmbeddingOracle for LevelOracle {
    fn embed(&mut self, window: &[f32]) -> Result<Embedding, OracleError> {
        let level = window.iter().sum::<f32>() / window.len() as f32;
        let mut values = vec![0.0; EMBEDDING_DIM];
        values[0] = 1.0 - level;
        values[1] = level;
        Embedding::new(values)
    }

    fn classify(&mut self, _embedding: &Embedding) -> Result<String, OracleError> {
        Ok("music".to_string())
    }
}
