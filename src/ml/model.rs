use burn::{
    nn::{
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, sigmoid},
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct SsmLmConfig {
    pub vocab_size: usize,
    pub d_model:    usize,
    pub num_layers: usize,
    pub d_ff:       usize,
    pub dropout:    f64,
}

impl SsmLmConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SsmLm<B> {
        let token_embedding = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let layers: Vec<SsmBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let lm_head    = LinearConfig::new(self.d_model, self.vocab_size).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        SsmLm { token_embedding, layers, final_norm, lm_head, dropout }
    }

    fn build_block<B: Backend>(&self, device: &B::Device) -> SsmBlock<B> {
        let gate       = LinearConfig::new(self.d_model, self.d_model).init(device);
        let input_proj = LinearConfig::new(self.d_model, self.d_model).init(device);
        let out_proj   = LinearConfig::new(self.d_model, self.d_model).init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        SsmBlock { gate, input_proj, out_proj, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct SsmBlock<B: Backend> {
    pub gate:        Linear<B>,
    pub input_proj:  Linear<B>,
    pub out_proj:    Linear<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> SsmBlock<B> {
    /// x: [batch, seq_len, d_model] → same shape.
    ///
    /// The recurrence carries a hidden state h across time steps.
    /// At each step a learned sigmoid gate decides, per channel,
    /// how much of the old state to keep versus the new input:
    ///
    ///   keep_t = σ(W_g · x_t)
    ///   h_t    = keep_t ⊙ h_{t-1} + (1 − keep_t) ⊙ (W_in · x_t)
    ///   y_t    = W_out · h_t
    ///
    /// Unlike self-attention this is O(seq_len) in time and O(1)
    /// in state, and needs no positional embedding — order is
    /// implicit in the recurrence.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch_size, seq_len, d_model] = x.dims();

        // ── Recurrent branch (pre-norm) ───────────────────────────────────────
        let normed = self.norm1.forward(x.clone());

        let mut state = Tensor::<B, 3>::zeros([batch_size, 1, d_model], &x.device());
        let mut outputs = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let x_t = normed
                .clone()
                .slice([0..batch_size, t..t + 1, 0..d_model]);

            let keep  = sigmoid(self.gate.forward(x_t.clone()));
            let input = self.input_proj.forward(x_t);

            // h = keep * h + (1 - keep) * input
            state = state * keep.clone() + input * (keep.ones_like() - keep);

            outputs.push(self.out_proj.forward(state.clone()));
        }

        let scanned = Tensor::cat(outputs, 1);
        let x = x + self.dropout.forward(scanned);

        // ── Feed-forward branch (pre-norm) ────────────────────────────────────
        let ffn_out = self.ffn_linear2.forward(
            gelu(self.ffn_linear1.forward(self.norm2.forward(x.clone())))
        );
        x + self.dropout.forward(ffn_out)
    }
}

#[derive(Module, Debug)]
pub struct SsmLm<B: Backend> {
    pub token_embedding: Embedding<B>,
    pub layers:          Vec<SsmBlock<B>>,
    pub final_norm:      LayerNorm<B>,
    pub lm_head:         Linear<B>,
    pub dropout:         Dropout,
}

impl<B: Backend> SsmLm<B> {
    /// input_ids: [batch, seq_len] → logits: [batch, seq_len, vocab_size].
    ///
    /// The model produces logits and nothing else — the training
    /// objective lives in the trainer, so the same forward serves
    /// training, validation, and generation.
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let mut x = self.dropout.forward(self.token_embedding.forward(input_ids));

        for layer in &self.layers {
            x = layer.forward(x);
        }

        let x = self.final_norm.forward(x); // [batch, seq_len, d_model]
        self.lm_head.forward(x)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    type B = NdArray<f32>;

    fn tiny_config() -> SsmLmConfig {
        SsmLmConfig::new(32, 8, 2, 16, 0.0)
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model: SsmLm<B> = tiny_config().init(&device);

        let input_ids = Tensor::<B, 1, Int>::from_ints(
            [1, 2, 3, 4, 5, 6, 7, 8].as_slice(), &device
        ).reshape([2, 4]);

        let logits = model.forward(input_ids);
        assert_eq!(logits.dims(), [2, 4, 32]);
    }

    #[test]
    fn test_forward_handles_length_one() {
        let device = Default::default();
        let model: SsmLm<B> = tiny_config().init(&device);

        let input_ids = Tensor::<B, 1, Int>::from_ints(
            [3].as_slice(), &device
        ).reshape([1, 1]);

        let logits = model.forward(input_ids);
        assert_eq!(logits.dims(), [1, 1, 32]);
    }

    #[test]
    fn test_logits_are_finite() {
        let device = Default::default();
        let model: SsmLm<B> = tiny_config().init(&device);

        let input_ids = Tensor::<B, 1, Int>::from_ints(
            [0, 31, 15, 1, 2, 3].as_slice(), &device
        ).reshape([1, 6]);

        let logits = model.forward(input_ids);
        let values = logits.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| v.is_finite()));
    }
}
