// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from raw JSONL rows
// all the way to GPU-ready tensor batches.
//
// The pipeline flows in this order:
//
//   raw dataset (.jsonl)
//       │
//       ▼
//   RawRecordLoader   → reads rows, keeps them as JSON maps
//       │
//       ▼
//   RecordFormatter   → raw row + system prompt → conversation
//       │
//       ▼
//   Splitter          → shuffles, splits, persists train/valid
//       │
//       ▼
//   ChatMlTemplate    → conversation → single template string
//       │
//       ▼
//   ConversationDataset → renders, tokenises, builds labels
//       │
//       ▼
//   DynamicBatcher    → pads samples into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Each module is responsible for exactly one step.
// This makes each step independently testable and replaceable.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Reads raw JSONL rows into JSON maps
pub mod loader;

/// Turns a raw row into a three-turn conversation
pub mod formatter;

/// Shuffles, splits, and persists train/validation sets
pub mod splitter;

/// ChatML implementation of the ChatTemplate trait
pub mod template;

/// Implements Burn's Dataset trait for tokenised conversations
pub mod dataset;

/// Implements Burn's Batcher trait with dynamic padding
pub mod batcher;
