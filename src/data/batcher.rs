// ============================================================
// Layer 4 — Dynamic Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec of
// TokenizedExamples into tensors.
//
// What is a Batcher?
//   A Batcher takes a list of individual samples and stacks
//   them into a single batch tensor. This is necessary because
//   accelerators are most efficient processing many samples at once.
//
// Unlike fixed-length pipelines, samples here arrive unpadded,
// so padding is batch-relative: every sequence is right-padded
// to the longest sequence in THIS batch. A batch of short
// conversations never pays for the longest conversation in the
// whole dataset.
//
// Padding values differ by tensor on purpose:
//   - input_ids padded with the tokenizer's pad id
//   - labels padded with IGNORE_INDEX (never the pad id —
//     otherwise the model would be trained to emit padding)
//   - attention_mask: 1 = real token, 0 = padding
//
// Reference: Burn Book §4 (Batcher)
//            Rust Book §8 (Vectors)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::{TokenizedExample, IGNORE_INDEX};

// ─── TrainingBatch ────────────────────────────────────────────────────────────
/// A batch of conversations ready for the model forward pass.
/// All tensors are [batch_size, padded_len].
///
/// B is the Burn Backend — generic so the same batcher works on
/// any device.
#[derive(Debug, Clone)]
pub struct TrainingBatch<B: Backend> {
    /// Token id sequences, right-padded with the pad id
    pub input_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding
    pub attention_mask: Tensor<B, 2, Int>,

    /// Target ids, IGNORE_INDEX on prompt and padding positions
    pub labels: Tensor<B, 2, Int>,
}

// ─── DynamicBatcher ───────────────────────────────────────────────────────────
/// The batcher struct — holds the pad id and the target device so
/// tensors are created in the right place.
#[derive(Clone, Debug)]
pub struct DynamicBatcher<B: Backend> {
    pub pad_id: u32,
    pub device: B::Device,
}

impl<B: Backend> DynamicBatcher<B> {
    pub fn new(pad_id: u32, device: B::Device) -> Self {
        Self { pad_id, device }
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// This is what makes DynamicBatcher work with Burn's DataLoader.
// The DataLoader calls .batch(items) with each mini-batch of samples.
impl<B: Backend> Batcher<TokenizedExample, TrainingBatch<B>> for DynamicBatcher<B> {
    /// Convert a Vec of TokenizedExamples into a single TrainingBatch.
    ///
    /// Steps:
    ///   1. Find the longest sequence in the batch
    ///   2. Flatten ids/labels/mask row by row, padding each to that length
    ///   3. Create 1D tensors and reshape to [batch_size, padded_len]
    fn batch(&self, items: Vec<TokenizedExample>) -> TrainingBatch<B> {
        let batch_size = items.len();
        let padded_len = items
            .iter()
            .map(|s| s.input_ids.len())
            .max()
            .unwrap_or(0);

        let mut input_flat  = Vec::with_capacity(batch_size * padded_len);
        let mut mask_flat   = Vec::with_capacity(batch_size * padded_len);
        let mut labels_flat = Vec::with_capacity(batch_size * padded_len);

        for sample in &items {
            let real = sample.input_ids.len();

            input_flat.extend(sample.input_ids.iter().map(|&x| x as i32));
            input_flat.extend(std::iter::repeat(self.pad_id as i32).take(padded_len - real));

            mask_flat.extend(std::iter::repeat(1i32).take(real));
            mask_flat.extend(std::iter::repeat(0i32).take(padded_len - real));

            labels_flat.extend(sample.labels.iter().map(|&x| x as i32));
            labels_flat.extend(std::iter::repeat(IGNORE_INDEX as i32).take(padded_len - real));
        }

        // Tensor::from_ints creates a 1D tensor from a slice,
        // then .reshape() gives it the correct 2D shape [batch, seq]
        let input_ids = Tensor::<B, 1, Int>::from_ints(
            input_flat.as_slice(), &self.device
        ).reshape([batch_size, padded_len]);

        let attention_mask = Tensor::<B, 1, Int>::from_ints(
            mask_flat.as_slice(), &self.device
        ).reshape([batch_size, padded_len]);

        let labels = Tensor::<B, 1, Int>::from_ints(
            labels_flat.as_slice(), &self.device
        ).reshape([batch_size, padded_len]);

        TrainingBatch { input_ids, attention_mask, labels }
    }
}
