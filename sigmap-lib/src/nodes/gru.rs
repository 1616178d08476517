use crate::graph::{ElementType, GraphError};

use super::activation::Activation;

const KIND: &str = "GRULayerNode";

/// Weights and biases for a gated recurrent unit layer.
///
/// Each weight matrix is `hidden_size x (input_size + hidden_size)`,
/// row-major, applied to the concatenation `[x; h]`.
#[derive(Clone, Debug, PartialEq)]
pub struct GruParameters {
    pub input_size: usize,
    pub hidden_size: usize,
    pub update_weights: Vec<f64>,
    pub reset_weights: Vec<f64>,
    pub hidden_weights: Vec<f64>,
    pub update_bias: Vec<f64>,
    pub reset_bias: Vec<f64>,
    pub hidden_bias: Vec<f64>,
    /// Applied to the candidate hidden state.
    pub activation: Activation,
    /// Applied to the update and reset gates.
    pub recurrent_activation: Activation,
    /// Precision the layer computes and emits in.
    pub element_type: ElementType,
}

impl GruParameters {
    /// Parameters with every weight and bias set to a constant.
    pub fn uniform(
        input_size: usize,
        hidden_size: usize,
        weight: f64,
        bias: f64,
        element_type: ElementType,
    ) -> Self {
        let matrix = vec![weight; hidden_size * (input_size + hidden_size)];
        let vector = vec![bias; hidden_size];
        Self {
            input_size,
            hidden_size,
            update_weights: matrix.clone(),
            reset_weights: matrix.clone(),
            hidden_weights: matrix,
            update_bias: vector.clone(),
            reset_bias: vector.clone(),
            hidden_bias: vector,
            activation: Activation::Tanh,
            recurrent_activation: Activation::Sigmoid,
            element_type,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GruLayer {
    params: GruParameters,
}

impl GruLayer {
    pub fn new(params: GruParameters) -> Result<Self, GraphError> {
        if params.input_size == 0 || params.hidden_size == 0 {
            return Err(GraphError::invalid(KIND, "input and hidden sizes must be non-zero"));
        }
        if !params.element_type.is_floating() {
            return Err(GraphError::invalid(
                KIND,
                format!("layer element type must be floating, got {}", params.element_type),
            ));
        }
        let matrix_len = params.hidden_size * (params.input_size + params.hidden_size);
        let matrices = [
            ("update_weights", &params.update_weights),
            ("reset_weights", &params.reset_weights),
            ("hidden_weights", &params.hidden_weights),
        ];
        for (name, weights) in matrices {
            if weights.len() != matrix_len {
                return Err(GraphError::invalid(
                    KIND,
                    format!("{name} has {} values, expected {matrix_len}", weights.len()),
                ));
            }
        }
        let biases = [
            ("update_bias", &params.update_bias),
            ("reset_bias", &params.reset_bias),
            ("hidden_bias", &params.hidden_bias),
        ];
        for (name, bias) in biases {
            if bias.len() != params.hidden_size {
                return Err(GraphError::invalid(
                    KIND,
                    format!("{name} has {} values, expected {}", bias.len(), params.hidden_size),
                ));
            }
        }
        Ok(Self { params })
    }

    pub fn input_size(&self) -> usize {
        self.params.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.params.hidden_size
    }

    pub fn element_type(&self) -> ElementType {
        self.params.element_type
    }

    pub fn params(&self) -> &GruParameters {
        &self.params
    }

    pub fn initial_state(&self) -> GruState {
        GruState {
            hidden: vec![0.0; self.params.hidden_size],
            scratch: Scratch::new(self.params.input_size, self.params.hidden_size),
            reset_was_active: false,
        }
    }

    /// Runs one frame. A falling edge on `reset_active` clears the hidden
    /// state before the update; a steady low level does not.
    pub fn step<'s>(
        &self,
        state: &'s mut GruState,
        input: impl IntoIterator<Item = f64>,
        reset_active: bool,
    ) -> &'s [f64] {
        if state.reset_was_active && !reset_active {
            state.hidden.fill(0.0);
        }
        state.reset_was_active = reset_active;

        let p = &self.params;
        let n = p.input_size;
        let Scratch {
            concat,
            update,
            reset,
            candidate,
        } = &mut state.scratch;

        for (slot, x) in concat[..n].iter_mut().zip(input) {
            *slot = x;
        }
        concat[n..].copy_from_slice(&state.hidden);

        matvec(&p.update_weights, concat, &p.update_bias, update);
        p.recurrent_activation.apply_in_place(update);
        matvec(&p.reset_weights, concat, &p.reset_bias, reset);
        p.recurrent_activation.apply_in_place(reset);

        for (slot, (r, h)) in concat[n..].iter_mut().zip(reset.iter().zip(&state.hidden)) {
            *slot = r * h;
        }
        matvec(&p.hidden_weights, concat, &p.hidden_bias, candidate);
        p.activation.apply_in_place(candidate);

        let round = p.element_type == ElementType::SmallReal;
        for ((h, z), c) in state.hidden.iter_mut().zip(update.iter()).zip(candidate.iter()) {
            let next = (1.0 - z) * c + z * *h;
            *h = if round { next as f32 as f64 } else { next };
        }
        &state.hidden
    }
}

/// `out = weights * x + bias` for a row-major matrix.
fn matvec(weights: &[f64], x: &[f64], bias: &[f64], out: &mut [f64]) {
    let cols = x.len();
    for ((row, b), o) in weights.chunks_exact(cols).zip(bias).zip(out.iter_mut()) {
        *o = row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + b;
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Scratch {
    concat: Vec<f64>,
    update: Vec<f64>,
    reset: Vec<f64>,
    candidate: Vec<f64>,
}

impl Scratch {
    fn new(input_size: usize, hidden_size: usize) -> Self {
        Self {
            concat: vec![0.0; input_size + hidden_size],
            update: vec![0.0; hidden_size],
            reset: vec![0.0; hidden_size],
            candidate: vec![0.0; hidden_size],
        }
    }
}

/// Hidden state plus the previous reset level, kept across frames.
#[derive(Clone, Debug, PartialEq)]
pub struct GruState {
    hidden: Vec<f64>,
    scratch: Scratch,
    reset_was_active: bool,
}

impl GruState {
    pub fn hidden(&self) -> &[f64] {
        &self.hidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn layer() -> GruLayer {
        GruLayer::new(GruParameters::uniform(3, 2, 0.1, 0.05, ElementType::Real)).unwrap()
    }

    #[test]
    fn test_hand_computed_step() {
        let gru = GruLayer::new(GruParameters::uniform(1, 1, 0.5, 0.0, ElementType::Real)).unwrap();
        let mut state = gru.initial_state();
        let out = gru.step(&mut state, [2.0], false)[0];

        // h = 0: z = sigmoid(1), c = tanh(1), h' = (1 - z) * c
        let z = 1.0 / (1.0 + (-1.0f64).exp());
        let expected = (1.0 - z) * 1.0f64.tanh();
        assert!(approx_eq!(f64, out, expected, epsilon = 1e-12));
    }

    #[test]
    fn test_falling_edge_clears_once() {
        let gru = layer();
        let frame = [1.0, -0.5, 0.25];

        let mut state = gru.initial_state();
        for _ in 0..5 {
            gru.step(&mut state, frame, true);
        }
        let warm = state.hidden().to_vec();

        let mut fresh = gru.initial_state();
        let from_zero = gru.step(&mut fresh, frame, false).to_vec();

        let on_edge = gru.step(&mut state, frame, false).to_vec();
        assert_eq!(on_edge, from_zero);
        assert_ne!(warm, from_zero);

        // Staying low must carry the state forward, not clear it again.
        let after_edge = gru.step(&mut state, frame, false).to_vec();
        assert_ne!(after_edge, from_zero);
    }

    #[test]
    fn test_rising_edge_does_not_clear() {
        let gru = layer();
        let frame = [0.3, 0.3, 0.3];
        let mut a = gru.initial_state();
        let mut b = gru.initial_state();
        for _ in 0..3 {
            gru.step(&mut a, frame, false);
            gru.step(&mut b, frame, false);
        }
        let held = gru.step(&mut a, frame, false).to_vec();
        let raised = gru.step(&mut b, frame, true).to_vec();
        assert_eq!(held, raised);
    }

    #[test]
    fn test_small_real_rounds_hidden_state() {
        let gru = GruLayer::new(GruParameters::uniform(2, 2, 0.3, 0.1, ElementType::SmallReal)).unwrap();
        let mut state = gru.initial_state();
        for &h in gru.step(&mut state, [0.7, 0.1], false) {
            assert_eq!(h, h as f32 as f64);
        }
    }

    #[test]
    fn test_rejects_wrong_weight_length() {
        let mut params = GruParameters::uniform(3, 2, 0.1, 0.0, ElementType::Real);
        params.reset_weights.pop();
        assert!(matches!(
            GruLayer::new(params),
            Err(GraphError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_rejects_integer_layer() {
        let params = GruParameters::uniform(3, 2, 0.1, 0.0, ElementType::Integer);
        assert!(GruLayer::new(params).is_err());
    }
}
