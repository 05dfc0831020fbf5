// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// No other layer imports from burn directly — only this one
// and the data layer's Dataset/Batcher impls.
//
// Why isolate Burn code here?
//   - If Burn's API changes, we only update this layer
//   - Other layers are testable without a device
//   - The model architecture is clearly separated from
//     data loading and application logic
//
// What's in this layer:
//
//   model.rs     — The gated state-space language model
//                  • Token embeddings
//                  • Stacked recurrent blocks, each with:
//                    layer norm, a learned per-channel decay
//                    gate over a hidden state carried across
//                    time steps, and a GELU feed-forward
//                  • Residual connections throughout
//                  • Vocabulary projection head
//
//   trainer.rs   — The training loop
//                  Forward pass, masked next-token loss,
//                  gradient accumulation, optimiser step,
//                  periodic checkpointing and per-epoch
//                  validation
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Gu & Dao (2023) Mamba: Linear-Time Sequence
//            Modeling with Selective State Spaces

/// Gated state-space language model architecture
pub mod model;

/// Training loop with gradient accumulation and checkpointing
pub mod trainer;
