use bytes::Bytes;
use silo_storage::{Backend, StorageResult};

/// Generate deterministic test data using a seeded pseudo-random generator
/// Same seed produces same output (reproducible tests)
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Store `data` under `name` with the given attributes in one transaction.
#[allow(dead_code)]
pub async fn store_chunk(
    backend: &dyn Backend,
    name: &str,
    data: Bytes,
    attrs: &[(&str, &str)],
) -> StorageResult<u64> {
    let mut writer = backend.put(name).await?;
    writer.write(data).await?;
    for (key, value) in attrs {
        writer.set_attr(key, value).await?;
    }
    writer.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_bytes_deterministic() {
        let data1 = seeded_bytes(42, 1000);
        let data2 = seeded_bytes(42, 1000);
        assert_eq!(data1, data2);
    }

    #[test]
    fn test_seeded_bytes_different_seeds() {
        let data1 = seeded_bytes(42, 1000);
        let data2 = seeded_bytes(43, 1000);
        assert_ne!(data1, data2);
    }
}
