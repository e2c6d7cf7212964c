//! CNN Model Architecture for Brain MRI Tumor Classification
//!
//! Three valid-padded convolution blocks, each followed by 2x2 max pooling,
//! then a dense head with dropout and a single logit output.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{activation::sigmoid, backend::Backend, Tensor},
};

/// Configuration for the TumorClassifier CNN model
#[derive(Config, Debug, PartialEq)]
pub struct TumorClassifierConfig {
    /// Input image size (square)
    #[config(default = "128")]
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Filters of the first block; doubled by each following block
    #[config(default = "32")]
    pub base_filters: usize,

    /// Units of the hidden dense layer
    #[config(default = "128")]
    pub hidden_units: usize,

    /// Dropout rate before the output layer
    #[config(default = "0.5")]
    pub dropout_rate: f64,
}

impl TumorClassifierConfig {
    /// Side length of the feature map after the last block
    pub fn feature_map_size(&self) -> usize {
        // Each block: 3x3 valid conv (-2), then 2x2 pool (/2)
        (0..3).fold(self.input_size, |size, _| (size - 2) / 2)
    }

    /// Length of the flattened feature vector fed to the dense head
    pub fn flattened_features(&self) -> usize {
        let side = self.feature_map_size();
        self.base_filters * 4 * side * side
    }

    /// Build a freshly initialized model
    pub fn init<B: Backend>(&self, device: &B::Device) -> TumorClassifier<B> {
        TumorClassifier::new(self, device)
    }
}

/// Conv2d (3x3, valid), ReLU, then 2x2 MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);

        Self {
            conv,
            relu: Relu::new(),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Binary tumor classifier
///
/// Both the placeholder model and every trained model are built through
/// [`TumorClassifier::new`], so records are always load-compatible.
#[derive(Module, Debug)]
pub struct TumorClassifier<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
    pub conv3: ConvBlock<B>,

    pub fc1: Linear<B>,
    pub relu: Relu,
    pub dropout: Dropout,
    pub fc2: Linear<B>,
}

impl<B: Backend> TumorClassifier<B> {
    pub fn new(config: &TumorClassifierConfig, device: &B::Device) -> Self {
        let base = config.base_filters;

        // 128 -> 63 -> 30 -> 14
        let conv1 = ConvBlock::new(config.in_channels, base, device);
        let conv2 = ConvBlock::new(base, base * 2, device);
        let conv3 = ConvBlock::new(base * 2, base * 4, device);

        let fc1 = LinearConfig::new(config.flattened_features(), config.hidden_units).init(device);
        let dropout = DropoutConfig::new(config.dropout_rate).init();
        let fc2 = LinearConfig::new(config.hidden_units, 1).init(device);

        Self {
            conv1,
            conv2,
            conv3,
            fc1,
            relu: Relu::new(),
            dropout,
            fc2,
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * Logits of shape [batch_size, 1]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);

        let x = x.flatten::<2>(1, 3);

        let x = self.fc1.forward(x);
        let x = self.relu.forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Tumor probability of shape [batch_size, 1]
    pub fn forward_probability(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        sigmoid(self.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_default_config() {
        let config = TumorClassifierConfig::new();
        assert_eq!(config.input_size, 128);
        assert_eq!(config.feature_map_size(), 14);
        assert_eq!(config.flattened_features(), 25088);
    }

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let model = TumorClassifierConfig::new().init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 128, 128], &device);
        let logits = model.forward(input.clone());
        assert_eq!(logits.dims(), [2, 1]);

        let probs: Vec<f32> = model
            .forward_probability(input)
            .into_data()
            .to_vec()
            .unwrap();
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_config_serializes() {
        let config = TumorClassifierConfig::new().with_hidden_units(64);
        let json = serde_json::to_string(&config).unwrap();
        let back: TumorClassifierConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
