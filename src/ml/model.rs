// ============================================================
// Layer 5 — Vision Transformer for hand heatmaps
// ============================================================
// Image [b, C, H, W]
//   → PatchEmbedding     conv patches + class token + positions
//   → depth × EncoderBlock  (pre-norm MHA + feed-forward, residual)
//   → HeatmapHead        token mean → LayerNorm → Linear → reshape
// Heatmaps [b, K, h, w]
//
// Reference: Dosovitskiy et al. (2021) An Image Is Worth 16x16 Words
//            Vaswani et al. (2017) Attention Is All You Need

use anyhow::{bail, Result};
use burn::{
    module::Param,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Dropout, DropoutConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::{activation, Distribution},
};
use std::fmt;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct HandPoseVitConfig {
    pub num_keypoints: usize,
    pub img_size:      usize,
    pub heatmap_size:  usize,
    #[config(default = 3)]
    pub in_channels: usize,
    #[config(default = 32)]
    pub patch_size: usize,
    #[config(default = 768)]
    pub emb_size: usize,
    #[config(default = 12)]
    pub depth: usize,
    #[config(default = 8)]
    pub num_heads: usize,
    #[config(default = 4)]
    pub forward_expansion: usize,
    /// Dropout after each attention / feed-forward sublayer
    #[config(default = 0.0)]
    pub dropout: f64,
    /// Dropout on the attention map
    #[config(default = 0.0)]
    pub attention_dropout: f64,
    /// Dropout inside the feed-forward block
    #[config(default = 0.0)]
    pub forward_dropout: f64,
}

impl HandPoseVitConfig {
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("num_keypoints", self.num_keypoints),
            ("img_size", self.img_size),
            ("heatmap_size", self.heatmap_size),
            ("in_channels", self.in_channels),
            ("patch_size", self.patch_size),
            ("emb_size", self.emb_size),
            ("num_heads", self.num_heads),
            ("forward_expansion", self.forward_expansion),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            bail!("{name} must be positive");
        }
        if self.img_size % self.patch_size != 0 {
            bail!(
                "img_size ({}) must be divisible by patch_size ({})",
                self.img_size, self.patch_size
            );
        }
        if self.emb_size % self.num_heads != 0 {
            bail!(
                "emb_size ({}) must be divisible by num_heads ({})",
                self.emb_size, self.num_heads
            );
        }
        for (name, p) in [
            ("dropout", self.dropout),
            ("attention_dropout", self.attention_dropout),
            ("forward_dropout", self.forward_dropout),
        ] {
            if !(0.0..1.0).contains(&p) {
                bail!("{name} must be in [0, 1), got {p}");
            }
        }
        Ok(())
    }

    /// Patches per image, excluding the class token
    pub fn num_patches(&self) -> usize {
        let per_side = self.img_size / self.patch_size;
        per_side * per_side
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> HandPoseVit<B> {
        let patch_embedding = self.build_patch_embedding(device);
        let encoder: Vec<EncoderBlock<B>> = (0..self.depth)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let head = HeatmapHead {
            norm:         LayerNormConfig::new(self.emb_size).init(device),
            linear:       LinearConfig::new(
                self.emb_size,
                self.num_keypoints * self.heatmap_size * self.heatmap_size,
            ).init(device),
            keypoints:    self.num_keypoints,
            heatmap_size: self.heatmap_size,
        };
        HandPoseVit { patch_embedding, encoder, head }
    }

    fn build_patch_embedding<B: Backend>(&self, device: &B::Device) -> PatchEmbedding<B> {
        let projection = Conv2dConfig::new(
            [self.in_channels, self.emb_size],
            [self.patch_size, self.patch_size],
        )
        .with_stride([self.patch_size, self.patch_size])
        .init(device);

        let class_token = Param::from_tensor(Tensor::random(
            [1, 1, self.emb_size],
            Distribution::Normal(0.0, 1.0),
            device,
        ));
        let positions = Param::from_tensor(Tensor::random(
            [self.num_patches() + 1, self.emb_size],
            Distribution::Normal(0.0, 1.0),
            device,
        ));
        PatchEmbedding { projection, class_token, positions }
    }

    fn build_attention<B: Backend>(&self, device: &B::Device) -> MultiHeadAttention<B> {
        let linear = || -> Linear<B> { LinearConfig::new(self.emb_size, self.emb_size).init(device) };
        MultiHeadAttention {
            queries:        linear(),
            keys:           linear(),
            values:         linear(),
            projection:     linear(),
            attention_drop: DropoutConfig::new(self.attention_dropout).init(),
            num_heads:      self.num_heads,
            head_dim:       self.emb_size / self.num_heads,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let hidden = self.emb_size * self.forward_expansion;
        EncoderBlock {
            norm1:     LayerNormConfig::new(self.emb_size).init(device),
            attention: self.build_attention(device),
            norm2:     LayerNormConfig::new(self.emb_size).init(device),
            feed_forward: FeedForward {
                linear1: LinearConfig::new(self.emb_size, hidden).init(device),
                dropout: DropoutConfig::new(self.forward_dropout).init(),
                linear2: LinearConfig::new(hidden, self.emb_size).init(device),
            },
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

// ─── Patch embedding ──────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct PatchEmbedding<B: Backend> {
    /// kernel = stride = patch_size, so each output pixel is one patch
    pub projection:  Conv2d<B>,
    pub class_token: Param<Tensor<B, 3>>,
    pub positions:   Param<Tensor<B, 2>>,
}

impl<B: Backend> PatchEmbedding<B> {
    /// images: [b, C, H, W] → tokens: [b, patches + 1, emb]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 3> {
        let batch = images.dims()[0];

        // b e h w → b (h w) e
        let patches = self.projection.forward(images).flatten::<3>(2, 3).swap_dims(1, 2);
        let emb = patches.dims()[2];

        let class_tokens = self.class_token.val().expand([batch, 1, emb]);
        let tokens = Tensor::cat(vec![class_tokens, patches], 1);

        tokens + self.positions.val().unsqueeze::<3>()
    }
}

// ─── Multi-head self-attention ────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct MultiHeadAttention<B: Backend> {
    pub queries:        Linear<B>,
    pub keys:           Linear<B>,
    pub values:         Linear<B>,
    pub projection:     Linear<B>,
    pub attention_drop: Dropout,
    pub num_heads:      usize,
    pub head_dim:       usize,
}

impl<B: Backend> MultiHeadAttention<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask: Option<Tensor<B, 3, Bool>>) -> Tensor<B, 3> {
        self.forward_with_weights(x, mask).0
    }

    /// Returns the attended tokens [b, n, emb] and the attention map [b, heads, n, n].
    ///
    /// `mask` is [b, n, n]; `true` marks query/key pairs that may attend.
    pub fn forward_with_weights(
        &self,
        x:    Tensor<B, 3>,
        mask: Option<Tensor<B, 3, Bool>>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let [batch, tokens, emb] = x.dims();

        let queries = self.split_heads(self.queries.forward(x.clone()));
        let keys    = self.split_heads(self.keys.forward(x.clone()));
        let values  = self.split_heads(self.values.forward(x));

        // [b, h, q, d] · [b, h, d, k] → [b, h, q, k]
        let mut energy = queries
            .matmul(keys.swap_dims(2, 3))
            .div_scalar((self.head_dim as f64).sqrt());

        if let Some(mask) = mask {
            let mask = mask
                .unsqueeze_dim::<4>(1)
                .expand([batch, self.num_heads, tokens, tokens]);
            energy = energy.mask_fill(mask.bool_not(), f32::MIN);
        }

        let attention = activation::softmax(energy, 3);
        let weighted  = self.attention_drop.forward(attention.clone()).matmul(values);

        // b h n d → b n (h d)
        let merged = weighted.swap_dims(1, 2).reshape([batch, tokens, emb]);
        (self.projection.forward(merged), attention)
    }

    // b n (h d) → b h n d
    fn split_heads(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch, tokens, _] = x.dims();
        x.reshape([batch, tokens, self.num_heads, self.head_dim])
            .swap_dims(1, 2)
    }
}

// ─── Encoder ──────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    pub linear1: Linear<B>,
    pub dropout: Dropout,
    pub linear2: Linear<B>,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = activation::gelu(self.linear1.forward(x));
        self.linear2.forward(self.dropout.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub norm1:        LayerNorm<B>,
    pub attention:    MultiHeadAttention<B>,
    pub norm2:        LayerNorm<B>,
    pub feed_forward: FeedForward<B>,
    pub dropout:      Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let attended = self.attention.forward(self.norm1.forward(x.clone()), None);
        let x = x + self.dropout.forward(attended);

        let fed = self.feed_forward.forward(self.norm2.forward(x.clone()));
        x + self.dropout.forward(fed)
    }
}

// ─── Head ─────────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct HeatmapHead<B: Backend> {
    pub norm:         LayerNorm<B>,
    pub linear:       Linear<B>,
    pub keypoints:    usize,
    pub heatmap_size: usize,
}

impl<B: Backend> HeatmapHead<B> {
    /// tokens: [b, n, emb] → heatmaps: [b, K, h, w]
    pub fn forward(&self, tokens: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch, _, emb] = tokens.dims();
        let pooled = tokens.mean_dim(1).reshape([batch, emb]);
        self.linear
            .forward(self.norm.forward(pooled))
            .reshape([batch, self.keypoints, self.heatmap_size, self.heatmap_size])
    }
}

// ─── Model ────────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct HandPoseVit<B: Backend> {
    pub patch_embedding: PatchEmbedding<B>,
    pub encoder:         Vec<EncoderBlock<B>>,
    pub head:            HeatmapHead<B>,
}

impl<B: Backend> HandPoseVit<B> {
    /// images: [b, C, H, W] → heatmaps: [b, K, h, w]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.patch_embedding.forward(images);
        for block in &self.encoder {
            x = block.forward(x);
        }
        self.head.forward(x)
    }

    /// Parameter counts per component for an input of `input_shape`.
    pub fn summary(&self, input_shape: [usize; 4]) -> ModelSummary {
        let mut layers = vec![("patch_embedding".to_string(), self.patch_embedding.num_params())];
        layers.extend(
            self.encoder
                .iter()
                .enumerate()
                .map(|(i, block)| (format!("encoder.{i}"), block.num_params())),
        );
        layers.push(("head".to_string(), self.head.num_params()));

        let tokens = self.patch_embedding.positions.val().dims()[0];
        ModelSummary {
            input_shape,
            output_shape: [
                input_shape[0],
                self.head.keypoints,
                self.head.heatmap_size,
                self.head.heatmap_size,
            ],
            tokens,
            total_params: layers.iter().map(|(_, n)| n).sum(),
            layers,
        }
    }
}

/// Printable overview of a model's layers and parameter counts.
#[derive(Debug, Clone)]
pub struct ModelSummary {
    pub input_shape:  [usize; 4],
    pub output_shape: [usize; 4],
    pub tokens:       usize,
    pub layers:       Vec<(String, usize)>,
    pub total_params: usize,
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<24}{:>16}", "Layer", "Params")?;
        writeln!(f, "{}", "-".repeat(40))?;
        for (name, params) in &self.layers {
            writeln!(f, "{name:<24}{params:>16}")?;
        }
        writeln!(f, "{}", "-".repeat(40))?;
        writeln!(f, "{:<24}{:>16}", "Total", self.total_params)?;
        writeln!(f, "Input:  {:?}", self.input_shape)?;
        writeln!(f, "Tokens: {}", self.tokens)?;
        write!(f, "Output: {:?}", self.output_shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny_config() -> HandPoseVitConfig {
        HandPoseVitConfig::new(3, 16, 8)
            .with_patch_size(8)
            .with_emb_size(16)
            .with_depth(2)
            .with_num_heads(2)
            .with_forward_expansion(2)
    }

    #[test]
    fn forward_produces_heatmap_shape() {
        let device = Default::default();
        let model: HandPoseVit<TestBackend> = tiny_config().init(&device);
        let images = Tensor::<TestBackend, 4>::random([2, 3, 16, 16], Distribution::Default, &device);
        assert_eq!(model.forward(images).dims(), [2, 3, 8, 8]);
    }

    #[test]
    fn patch_embedding_adds_class_token() {
        let device = Default::default();
        let cfg = tiny_config();
        let model: HandPoseVit<TestBackend> = cfg.init(&device);
        let images = Tensor::<TestBackend, 4>::zeros([2, 3, 16, 16], &device);
        let tokens = model.patch_embedding.forward(images);
        assert_eq!(cfg.num_patches(), 4);
        assert_eq!(tokens.dims(), [2, 5, 16]);
    }

    #[test]
    fn attention_rows_sum_to_one() {
        let device = Default::default();
        let model: HandPoseVit<TestBackend> = tiny_config().init(&device);
        let x = Tensor::<TestBackend, 3>::random([2, 5, 16], Distribution::Default, &device);
        let (out, weights) = model.encoder[0].attention.forward_with_weights(x, None);

        assert_eq!(out.dims(), [2, 5, 16]);
        assert_eq!(weights.dims(), [2, 2, 5, 5]);
        let sums = weights.sum_dim(3).into_data().to_vec::<f32>().unwrap();
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-5));
    }

    #[test]
    fn masked_keys_receive_no_attention() {
        let device = Default::default();
        let model: HandPoseVit<TestBackend> = tiny_config().init(&device);
        let attention = &model.encoder[0].attention;
        let x = Tensor::<TestBackend, 3>::random([1, 3, 16], Distribution::Default, &device);

        // every query may attend to keys 0 and 1 only
        let mask = Tensor::<TestBackend, 1, Bool>::from_bool(
            TensorData::from([true, true, false]),
            &device,
        )
        .reshape([1, 1, 3])
        .expand([1, 3, 3]);
        let (_, weights) = attention.forward_with_weights(x.clone(), Some(mask));
        let hidden = weights
            .slice([0..1, 0..2, 0..3, 2..3])
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert!(hidden.iter().all(|w| w.abs() < 1e-6));

        let full = Tensor::<TestBackend, 3, Bool>::from_bool(
            TensorData::new(vec![true; 9], [1, 3, 3]),
            &device,
        );
        let masked   = attention.forward(x.clone(), Some(full)).into_data().to_vec::<f32>().unwrap();
        let unmasked = attention.forward(x, None).into_data().to_vec::<f32>().unwrap();
        for (a, b) in masked.iter().zip(&unmasked) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn validate_rejects_bad_geometry() {
        assert!(tiny_config().validate().is_ok());
        assert!(tiny_config().with_patch_size(5).validate().is_err());
        assert!(tiny_config().with_num_heads(3).validate().is_err());
        assert!(tiny_config().with_dropout(1.0).validate().is_err());
        assert!(HandPoseVitConfig::new(0, 16, 8).validate().is_err());
    }

    #[test]
    fn summary_counts_every_parameter() {
        let device = Default::default();
        let model: HandPoseVit<TestBackend> = tiny_config().init(&device);
        let summary = model.summary([1, 3, 16, 16]);
        assert_eq!(summary.total_params, model.num_params());
        assert_eq!(summary.layers.len(), 4);
        assert_eq!(summary.tokens, 5);
        assert_eq!(summary.output_shape, [1, 3, 8, 8]);
        assert!(summary.to_string().contains("encoder.1"));
    }
}
