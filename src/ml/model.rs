// ============================================================
// Layer 5 — Property Prediction Model
// ============================================================
// A feed-forward network over molecule feature vectors. The
// model always emits raw scores — sigmoid / softmax / inverse
// scaling happen in the prediction path, never inside forward,
// so the losses can work on logits directly.
//
// Output width per dataset type:
//   regression / classification / spectra : num_tasks
//   multiclass                            : num_tasks * num_classes
//
// Reference: Burn Book §3 (Building Blocks), §5 (Modules)

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct MoleculePredictorConfig {
    pub input_dim:       usize,
    pub ffn_hidden_size: usize,
    /// Total count of linear layers (1 = a single input→output map)
    pub ffn_num_layers:  usize,
    pub output_dim:      usize,
    pub dropout:         f64,
}

impl MoleculePredictorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MoleculePredictor<B> {
        let dropout = DropoutConfig::new(self.dropout).init();

        if self.ffn_num_layers <= 1 {
            return MoleculePredictor {
                input:  LinearConfig::new(self.input_dim, self.output_dim).init(device),
                hidden: Vec::new(),
                output: None,
                dropout,
            };
        }

        let input = LinearConfig::new(self.input_dim, self.ffn_hidden_size).init(device);
        let hidden: Vec<Linear<B>> = (0..self.ffn_num_layers - 2)
            .map(|_| LinearConfig::new(self.ffn_hidden_size, self.ffn_hidden_size).init(device))
            .collect();
        let output = LinearConfig::new(self.ffn_hidden_size, self.output_dim).init(device);

        MoleculePredictor {
            input,
            hidden,
            output: Some(output),
            dropout,
        }
    }
}

#[derive(Module, Debug)]
pub struct MoleculePredictor<B: Backend> {
    pub input:   Linear<B>,
    pub hidden:  Vec<Linear<B>>,
    pub output:  Option<Linear<B>>,
    pub dropout: Dropout,
}

impl<B: Backend> MoleculePredictor<B> {
    /// features: [batch, input_dim] → raw scores: [batch, output_dim]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = self.input.forward(self.dropout.forward(features));
        for layer in &self.hidden {
            x = layer.forward(self.dropout.forward(relu(x)));
        }
        match &self.output {
            Some(output) => output.forward(self.dropout.forward(relu(x))),
            None => x,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let model = MoleculePredictorConfig::new(16, 8, 3, 2, 0.0).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 2>::zeros([4, 16], &device);
        assert_eq!(model.forward(x).dims(), [4, 2]);
        assert_eq!(model.hidden.len(), 1);
    }

    #[test]
    fn test_single_layer_degenerates_to_linear_map() {
        let device = Default::default();
        let model = MoleculePredictorConfig::new(16, 8, 1, 3, 0.0).init::<TestBackend>(&device);
        assert!(model.hidden.is_empty());
        assert!(model.output.is_none());
        let x = Tensor::<TestBackend, 2>::zeros([2, 16], &device);
        assert_eq!(model.forward(x).dims(), [2, 3]);
    }
}
