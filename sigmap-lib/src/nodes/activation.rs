/// Element-wise activation applied by recurrent layers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Tanh,
    Sigmoid,
    HardSigmoid,
    Relu,
    Linear,
}

impl Activation {
    #[inline]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::HardSigmoid => (0.2 * x + 0.5).clamp(0.0, 1.0),
            Activation::Relu => x.max(0.0),
            Activation::Linear => x,
        }
    }

    pub fn apply_in_place(self, values: &mut [f64]) {
        for v in values {
            *v = self.apply(*v);
        }
    }
}
