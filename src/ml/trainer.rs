// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full fine-tuning loop using Burn's DataLoader with gradient
// accumulation and step-based checkpointing.
//
// Key Burn insights:
//   - Training uses MyBackend (Autodiff<NdArray>) for gradients
//   - model.valid() returns the model on MyInnerBackend (NdArray)
//   - Validation batcher must also use MyInnerBackend
//   - The loss is computed HERE, not inside the model: the model
//     only maps ids to logits, so next-token shifting and label
//     masking stay in one place
//
// Loss: next-token cross-entropy. Logits at position t are
// scored against the label at position t+1; positions whose
// label is IGNORE_INDEX (prompt and padding) contribute nothing,
// and the sum is normalised by the number of live positions.
//
// A non-finite loss aborts the run immediately with the step
// index. Stepping an optimiser on NaN gradients corrupts every
// parameter, so there is nothing sensible to continue with.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{bail, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, AdamWConfig, GradientsAccumulator, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::DynamicBatcher,
    dataset::{ConversationDataset, IGNORE_INDEX},
};
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::model::{SsmLm, SsmLmConfig};

type MyBackend      = burn::backend::Autodiff<burn::backend::NdArray<f32>>;
type MyInnerBackend = burn::backend::NdArray<f32>;

pub fn run_training(
    cfg:           &TrainConfig,
    vocab_size:    usize,
    pad_id:        u32,
    train_dataset: ConversationDataset,
    valid_dataset: Option<ConversationDataset>,
    ckpt_manager:  CheckpointManager,
    metrics:       MetricsLogger,
) -> Result<()> {
    let device = burn::backend::ndarray::NdArrayDevice::default();
    tracing::info!("Using NdArray device: {:?}", device);

    let model_cfg = SsmLmConfig::new(
        vocab_size, cfg.d_model, cfg.num_layers, cfg.d_ff, cfg.dropout,
    );
    let model: SsmLm<MyBackend> = model_cfg.init(&device);

    // Fine-tuning continues from saved weights when a previous
    // run left a checkpoint in the output directory
    let model = if ckpt_manager.has_checkpoint() {
        tracing::info!("Existing checkpoint found — resuming from saved weights");
        ckpt_manager.load_model(model, &device)?
    } else {
        model
    };

    tracing::info!(
        "Model ready: {} layers, d_model={}, vocab={}",
        cfg.num_layers, cfg.d_model, vocab_size
    );

    // Optimiser variant is runtime configuration; each arm
    // monomorphises the same loop over a different Optimizer impl.
    match cfg.optimizer.as_str() {
        "adamw" => fit(
            cfg, model, AdamWConfig::new().init(),
            pad_id, train_dataset, valid_dataset, ckpt_manager, metrics, device,
        ),
        "adam" => fit(
            cfg, model, AdamConfig::new().with_epsilon(1e-8).init(),
            pad_id, train_dataset, valid_dataset, ckpt_manager, metrics, device,
        ),
        "sgd" => fit(
            cfg, model, SgdConfig::new().init(),
            pad_id, train_dataset, valid_dataset, ckpt_manager, metrics, device,
        ),
        other => bail!("Unknown optimizer '{other}' (expected adamw, adam, or sgd)"),
    }
}

#[allow(clippy::too_many_arguments)]
fn fit<O>(
    cfg:           &TrainConfig,
    mut model:     SsmLm<MyBackend>,
    mut optim:     O,
    pad_id:        u32,
    train_dataset: ConversationDataset,
    valid_dataset: Option<ConversationDataset>,
    ckpt_manager:  CheckpointManager,
    metrics:       MetricsLogger,
    device:        burn::backend::ndarray::NdArrayDevice,
) -> Result<()>
where
    O: Optimizer<SsmLm<MyBackend>, MyBackend>,
{
    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_batcher = DynamicBatcher::<MyBackend>::new(pad_id, device.clone());
    let train_loader  = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(42)
        .num_workers(1)
        .build(train_dataset);

    // ── Validation data loader (InnerBackend — no autodiff overhead) ──────────
    let valid_loader = valid_dataset.map(|dataset| {
        let batcher = DynamicBatcher::<MyInnerBackend>::new(pad_id, device.clone());
        DataLoaderBuilder::new(batcher)
            .batch_size(cfg.batch_size)
            .num_workers(1)
            .build(dataset)
    });

    let mut accumulator = GradientsAccumulator::new();
    let mut accumulated = 0usize;
    let mut optim_steps = 0usize;
    let mut micro_steps = 0usize;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;
        let mut train_tokens   = 0i64;
        let mut window_loss    = 0.0f64;
        let mut window_batches = 0usize;

        for batch in train_loader.iter() {
            micro_steps += 1;

            // Real (unpadded) tokens seen this batch
            train_tokens += batch.attention_mask.sum().into_scalar().elem::<i64>();

            let logits = model.forward(batch.input_ids);
            let loss   = next_token_loss(logits, batch.labels);

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            if !loss_val.is_finite() {
                bail!(
                    "Non-finite training loss ({loss_val}) at micro-step {micro_steps} \
                     (epoch {epoch}); aborting"
                );
            }
            train_loss_sum += loss_val;
            train_batches  += 1;
            window_loss    += loss_val;
            window_batches += 1;

            // Backward pass; the optimiser only steps once enough
            // micro-batches have been accumulated
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            accumulator.accumulate(&model, grads);
            accumulated += 1;

            if accumulated >= cfg.grad_accum.max(1) {
                model = optim.step(cfg.lr, model, accumulator.grads());
                accumulated = 0;
                optim_steps += 1;

                if optim_steps % cfg.log_every.max(1) == 0 {
                    println!(
                        "Step {:>6} | epoch {} | loss={:.4}",
                        optim_steps,
                        epoch,
                        window_loss / window_batches.max(1) as f64,
                    );
                    window_loss    = 0.0;
                    window_batches = 0;
                }

                if cfg.save_steps > 0 && optim_steps % cfg.save_steps == 0 {
                    ckpt_manager.save_model(&model, optim_steps)?;
                    tracing::info!("Checkpoint saved at step {}", optim_steps);
                }
            }
        }

        // Flush a partial accumulation window at the epoch boundary
        // so its gradients are not carried into the next epoch
        if accumulated > 0 {
            model = optim.step(cfg.lr, model, accumulator.grads());
            accumulated = 0;
            optim_steps += 1;
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase ──────────────────────────────────────────────────
        // model.valid() → SsmLm<MyInnerBackend>, dropout disabled
        let avg_valid_loss = match &valid_loader {
            Some(loader) => {
                let model_valid = model.valid();
                let mut loss_sum = 0.0f64;
                let mut batches  = 0usize;

                for batch in loader.iter() {
                    let logits = model_valid.forward(batch.input_ids);
                    let loss: f64 = next_token_loss(logits, batch.labels)
                        .into_scalar().elem::<f64>();
                    loss_sum += loss;
                    batches  += 1;
                }

                Some(if batches > 0 { loss_sum / batches as f64 } else { f64::NAN })
            }
            None => None,
        };

        match avg_valid_loss {
            Some(valid_loss) => println!(
                "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | tokens={}",
                epoch, cfg.epochs, avg_train_loss, valid_loss, train_tokens,
            ),
            None => println!(
                "Epoch {:>3}/{} | train_loss={:.4} | tokens={}",
                epoch, cfg.epochs, avg_train_loss, train_tokens,
            ),
        }

        metrics.log_epoch(epoch, avg_train_loss, avg_valid_loss)?;
    }

    // Always persist the final weights, whatever the save cadence
    ckpt_manager.save_model(&model, optim_steps)?;
    tracing::info!("Training complete — final checkpoint at step {}", optim_steps);
    Ok(())
}

/// Masked next-token cross-entropy.
///
/// Logits at position t predict the token at position t+1, so the
/// last logit row and the first label column are dropped before
/// flattening. Positions whose (shifted) label is IGNORE_INDEX are
/// excluded; the result is the mean over live positions.
fn next_token_loss<B: Backend>(
    logits: Tensor<B, 3>,
    labels: Tensor<B, 2, Int>,
) -> Tensor<B, 1> {
    let [batch_size, seq_len, vocab_size] = logits.dims();

    // A single-token sequence has no next token to predict
    if seq_len < 2 {
        return logits.sum().mul_scalar(0.0);
    }

    let logits = logits
        .slice([0..batch_size, 0..seq_len - 1, 0..vocab_size])
        .reshape([batch_size * (seq_len - 1), vocab_size]);
    let labels = labels
        .slice([0..batch_size, 1..seq_len])
        .reshape([batch_size * (seq_len - 1)]);

    let ignored = labels.clone().equal_elem(IGNORE_INDEX as i32);
    let live    = ignored.clone().bool_not().float();

    // Ignored labels are gathered at index 0 and zeroed afterwards,
    // which keeps the gather in bounds without branching
    let safe_labels = labels.mask_fill(ignored, 0);

    let log_probs = log_softmax(logits, 1);
    let nll = -log_probs
        .gather(1, safe_labels.unsqueeze_dim::<2>(1))
        .squeeze::<1>(1);

    (nll * live.clone()).sum() / live.sum().clamp_min(1.0)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    type B = NdArray<f32>;

    fn logits_from(values: &[f32], shape: [usize; 3]) -> Tensor<B, 3> {
        Tensor::<B, 1>::from_floats(values, &Default::default()).reshape(shape)
    }

    fn labels_from(values: &[i32], shape: [usize; 2]) -> Tensor<B, 2, Int> {
        Tensor::<B, 1, Int>::from_ints(values, &Default::default()).reshape(shape)
    }

    #[test]
    fn test_uniform_logits_give_log_vocab() {
        // 1 sequence of 3 tokens, vocab 4, all logits equal →
        // every live position costs ln(4)
        let logits = logits_from(&[0.0; 12], [1, 3, 4]);
        let labels = labels_from(&[-100, 2, 1], [1, 3]);

        let loss: f32 = next_token_loss(logits, labels).into_scalar().elem();
        let expected = (4.0f32).ln();
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_ignored_positions_do_not_contribute() {
        // Same logits; masking one of the two live labels must not
        // change the per-position mean
        let logits = logits_from(&[0.0; 12], [1, 3, 4]);

        let both   = labels_from(&[-100, 2, 1], [1, 3]);
        let single = labels_from(&[-100, 2, -100], [1, 3]);

        let loss_both:   f32 = next_token_loss(logits.clone(), both).into_scalar().elem();
        let loss_single: f32 = next_token_loss(logits, single).into_scalar().elem();
        assert!((loss_both - loss_single).abs() < 1e-5);
    }

    #[test]
    fn test_all_ignored_gives_zero() {
        let logits = logits_from(&[0.5; 12], [1, 3, 4]);
        let labels = labels_from(&[-100, -100, -100], [1, 3]);

        let loss: f32 = next_token_loss(logits, labels).into_scalar().elem();
        assert_eq!(loss, 0.0);
    }

    #[test]
    fn test_confident_correct_prediction_has_low_loss() {
        // Position 0 predicts label at position 1 (= id 1) with a
        // large logit margin → loss close to zero
        let logits = logits_from(
            &[
                -10.0, 10.0, -10.0, -10.0, // t=0, strongly predicts id 1
                0.0, 0.0, 0.0, 0.0,        // t=1, dropped by the shift
            ],
            [1, 2, 4],
        );
        let labels = labels_from(&[-100, 1], [1, 2]);

        let loss: f32 = next_token_loss(logits, labels).into_scalar().elem();
        assert!(loss < 1e-3);
    }

    #[test]
    fn test_length_one_sequence_is_zero_loss() {
        let logits = logits_from(&[1.0, 2.0, 3.0, 4.0], [1, 1, 4]);
        let labels = labels_from(&[3], [1, 1]);

        let loss: f32 = next_token_loss(logits, labels).into_scalar().elem();
        assert_eq!(loss, 0.0);
    }
}
