use ndarray::{Array1, Array2, ArrayView1, Axis, Zip};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::features::{FEATURE_DIM, TARGET_DIM};

/// Hidden layer width.
pub const DEFAULT_HIDDEN_UNITS: usize = 10;

/// Adam step size.
pub const DEFAULT_LEARNING_RATE: f32 = 0.001;

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-7;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ModelError {
    #[error("Expected {expected} {what} values, got {got}")]
    Shape {
        what: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Voice parameters predicted for a piece of text, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub accent: f32,
    pub tone: f32,
    pub pitch: f32,
}

/// Parameters for constructing a [`ParameterModel`].
#[derive(Debug, Clone)]
pub struct ModelParams {
    pub hidden_units: usize,
    pub learning_rate: f32,
    /// Seed for weight initialization. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            hidden_units: DEFAULT_HIDDEN_UNITS,
            learning_rate: DEFAULT_LEARNING_RATE,
            seed: None,
        }
    }
}

/// Fully connected layer with its Adam moment estimates.
#[derive(Debug, Clone)]
struct Dense {
    weights: Array2<f32>,
    bias: Array1<f32>,
    m_weights: Array2<f32>,
    v_weights: Array2<f32>,
    m_bias: Array1<f32>,
    v_bias: Array1<f32>,
}

impl Dense {
    /// Glorot-uniform weights, zero bias.
    fn new(inputs: usize, outputs: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f32).sqrt();
        Self {
            weights: Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-limit..limit)),
            bias: Array1::zeros(outputs),
            m_weights: Array2::zeros((inputs, outputs)),
            v_weights: Array2::zeros((inputs, outputs)),
            m_bias: Array1::zeros(outputs),
            v_bias: Array1::zeros(outputs),
        }
    }

    fn forward(&self, x: &ArrayView1<f32>) -> Array1<f32> {
        x.dot(&self.weights) + &self.bias
    }

    fn adam_update(&mut self, grad_w: &Array2<f32>, grad_b: &Array1<f32>, lr: f32, t: i32) {
        let correct1 = 1.0 - BETA1.powi(t);
        let correct2 = 1.0 - BETA2.powi(t);
        let step = |p: &mut f32, m: &mut f32, v: &mut f32, g: f32| {
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            let m_hat = *m / correct1;
            let v_hat = *v / correct2;
            *p -= lr * m_hat / (v_hat.sqrt() + EPSILON);
        };

        Zip::from(&mut self.weights)
            .and(&mut self.m_weights)
            .and(&mut self.v_weights)
            .and(grad_w)
            .for_each(|p, m, v, &g| step(p, m, v, g));
        Zip::from(&mut self.bias)
            .and(&mut self.m_bias)
            .and(&mut self.v_bias)
            .and(grad_b)
            .for_each(|p, m, v, &g| step(p, m, v, g));
    }
}

/// Intermediate values of one forward pass, kept for backpropagation.
struct Activations {
    hidden_pre: Array1<f32>,
    hidden: Array1<f32>,
    output: Array1<f32>,
}

/// Feed-forward regressor `5 -> hidden (ReLU) -> 3 (sigmoid)` trained online
/// with mean squared error and Adam.
///
/// The model is a placeholder heuristic: its inputs are coarse text counts and
/// its outputs only steer pitch, rate and which platform voice is picked.
#[derive(Debug, Clone)]
pub struct ParameterModel {
    hidden: Dense,
    output: Dense,
    learning_rate: f32,
    /// Adam timestep, shared by both layers.
    t: i32,
}

impl Default for ParameterModel {
    fn default() -> Self {
        Self::new(ModelParams::default())
    }
}

impl ParameterModel {
    pub fn new(params: ModelParams) -> Self {
        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let hidden_units = params.hidden_units.max(1);
        log::debug!(
            "Initializing parameter model {FEATURE_DIM}->{hidden_units}->{TARGET_DIM} (lr={})",
            params.learning_rate
        );

        Self {
            hidden: Dense::new(FEATURE_DIM, hidden_units, &mut rng),
            output: Dense::new(hidden_units, TARGET_DIM, &mut rng),
            learning_rate: params.learning_rate,
            t: 0,
        }
    }

    /// Predict `{accent, tone, pitch}` for a 5-value feature vector.
    pub fn predict(&self, features: &[f32]) -> Result<Prediction, ModelError> {
        check_width("feature", FEATURE_DIM, features.len())?;
        let out = self.forward(ArrayView1::from(features)).output;
        Ok(Prediction {
            accent: out[0],
            tone: out[1],
            pitch: out[2],
        })
    }

    /// Run `steps` Adam updates toward `target` on a single example and
    /// return the loss after the last update.
    pub fn train(&mut self, features: &[f32], target: &[f32], steps: usize) -> Result<f32, ModelError> {
        check_width("feature", FEATURE_DIM, features.len())?;
        check_width("target", TARGET_DIM, target.len())?;

        let x = ArrayView1::from(features);
        let y_true = ArrayView1::from(target);

        for _ in 0..steps {
            let acts = self.forward(x);

            // d(mean squared error)/d(output)
            let d_out = (&acts.output - &y_true) * (2.0 / TARGET_DIM as f32);
            let d_out_pre = &d_out * &acts.output.mapv(|y| y * (1.0 - y));

            let grad_w2 = outer(&acts.hidden.view(), &d_out_pre.view());
            let d_hidden = self.output.weights.dot(&d_out_pre);
            let d_hidden_pre = Zip::from(&d_hidden)
                .and(&acts.hidden_pre)
                .map_collect(|&g, &z| if z > 0.0 { g } else { 0.0 });
            let grad_w1 = outer(&x, &d_hidden_pre.view());

            self.t += 1;
            self.output
                .adam_update(&grad_w2, &d_out_pre, self.learning_rate, self.t);
            self.hidden
                .adam_update(&grad_w1, &d_hidden_pre, self.learning_rate, self.t);
        }

        let out = self.forward(x).output;
        let loss = (&out - &y_true).mapv(|d| d * d).mean().unwrap_or(0.0);
        log::debug!("Trained {steps} steps, loss={loss:.6}");
        Ok(loss)
    }

    fn forward(&self, x: ArrayView1<f32>) -> Activations {
        let hidden_pre = self.hidden.forward(&x);
        let hidden = hidden_pre.mapv(|z| z.max(0.0));
        let output = self.output.forward(&hidden.view()).mapv(sigmoid);
        Activations {
            hidden_pre,
            hidden,
            output,
        }
    }
}

fn check_width(what: &'static str, expected: usize, got: usize) -> Result<(), ModelError> {
    if got != expected {
        return Err(ModelError::Shape { what, expected, got });
    }
    Ok(())
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn outer(a: &ArrayView1<f32>, b: &ArrayView1<f32>) -> Array2<f32> {
    let col = a.view().insert_axis(Axis(1));
    let row = b.view().insert_axis(Axis(0));
    col.dot(&row)
}
