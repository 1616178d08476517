use super::*;
use crate::graph::{Model, ModelBuilder, NodeHandle, Shape};
use crate::nodes::{GruParameters, VoiceActivityDetectorParams};

fn input(model: &mut Model, len: usize, element_type: ElementType) -> NodeHandle {
    ModelBuilder::new()
        .add_input_node(model, Shape::vector(len), element_type)
        .unwrap()
}

fn cast(model: &mut Model, from: PortRef, target: ElementType) -> NodeHandle {
    ModelBuilder::new()
        .add_type_cast_node(model, from, target)
        .unwrap()
}

fn vad(model: &mut Model, from: PortRef) -> NodeHandle {
    ModelBuilder::new()
        .add_voice_activity_detector_node(model, from, VoiceActivityDetectorParams::default())
        .unwrap()
}

fn options() -> MapCompilerOptions {
    MapCompilerOptions::default()
}

#[test]
fn test_empty_output_selection() {
    let mut model = Model::new();
    let x = input(&mut model, 4, ElementType::Real);
    let map = Map::new(model, x.id(), vec![]).unwrap();

    assert_eq!(
        lower(&map, &options()).unwrap_err(),
        CompileError::EmptyOutputSelection
    );
}

#[test]
fn test_output_type_must_match_input() {
    let mut model = Model::new();
    let x = input(&mut model, 16, ElementType::Real);
    let flag = vad(&mut model, x.output());
    let out = ModelBuilder::new()
        .add_output_node(&mut model, Shape::scalar(), flag.output())
        .unwrap();
    let map = Map::new(model, x.id(), vec![out.output()]).unwrap();

    assert_eq!(
        compile(&map, CompileTarget::default(), &options()).unwrap_err(),
        CompileError::UnsupportedTypeCombination {
            context: "map output",
            expected: ElementType::Real,
            found: ElementType::Integer,
        }
    );
}

#[test]
fn test_detector_on_small_real_gets_one_implicit_conversion() {
    let mut model = Model::new();
    let x = input(&mut model, 16, ElementType::SmallReal);
    let flag = vad(&mut model, x.output());
    let back = cast(&mut model, flag.output(), ElementType::SmallReal);
    let map = Map::new(model, x.id(), vec![back.output()]).unwrap();

    let graph = lower(&map, &options()).unwrap();
    assert_eq!(graph.implicit_conversions(), 1);
    assert_eq!(graph.steps.len(), 3);
    assert_eq!(graph.steps[0].op, Op::Convert { implicit: true });
    assert_eq!(graph.steps[0].node, flag.id());
    assert_eq!(graph.slots[graph.steps[0].output].element_type, ElementType::Real);
    assert!(graph.validate().is_ok());
}

#[test]
fn test_detector_on_real_needs_no_conversion() {
    let mut model = Model::new();
    let x = input(&mut model, 16, ElementType::Real);
    let flag = vad(&mut model, x.output());
    let back = cast(&mut model, flag.output(), ElementType::Real);
    let map = Map::new(model, x.id(), vec![back.output()]).unwrap();

    let graph = lower(&map, &options()).unwrap();
    assert_eq!(graph.implicit_conversions(), 0);
    assert_eq!(graph.order, vec![x.id(), flag.id(), back.id()]);
}

#[test]
fn test_gru_input_converted_to_layer_precision() {
    let builder = ModelBuilder::new();
    let mut model = Model::new();
    let x = input(&mut model, 4, ElementType::Real);
    let flag = vad(&mut model, x.output());
    let gru = builder
        .add_gru_layer_node(
            &mut model,
            x.output(),
            flag.output(),
            GruParameters::uniform(4, 2, 0.1, 0.0, ElementType::SmallReal),
        )
        .unwrap();
    let back = cast(&mut model, gru.output(), ElementType::Real);
    let map = Map::new(model, x.id(), vec![back.output()]).unwrap();

    let graph = lower(&map, &options()).unwrap();
    // Only the GRU data input converts; the reset input is read as-is.
    assert_eq!(graph.implicit_conversions(), 1);
    let gru_step = graph
        .steps
        .iter()
        .find(|step| matches!(step.op, Op::Gru(_)))
        .unwrap();
    assert_eq!(
        graph.slots[gru_step.inputs[0]].element_type,
        ElementType::SmallReal
    );
    assert_eq!(
        graph.slots[gru_step.inputs[1]].element_type,
        ElementType::Integer
    );
}

#[test]
fn test_identity_cast_folding() {
    let mut model = Model::new();
    let x = input(&mut model, 3, ElementType::Real);
    let same = cast(&mut model, x.output(), ElementType::Real);
    let map = Map::new(model, x.id(), vec![same.output()]).unwrap();

    let folded = lower(&map, &options()).unwrap();
    assert!(folded.steps.is_empty());
    assert_eq!(folded.output_slots, vec![folded.input_slot]);

    let unfolded_options = options().with_optimizer(OptimizerOptions {
        fold_identity_casts: false,
        passes: Vec::new(),
    });
    let unfolded = lower(&map, &unfolded_options).unwrap();
    assert_eq!(unfolded.steps.len(), 1);
    assert_eq!(unfolded.steps[0].op, Op::Convert { implicit: false });
    assert_eq!(unfolded.implicit_conversions(), 0);
}

#[test]
fn test_cycle_is_rejected() {
    let mut model = Model::new();
    let x = input(&mut model, 2, ElementType::Real);
    let a = cast(&mut model, x.output(), ElementType::Real);
    let b = cast(&mut model, a.output(), ElementType::Real);
    model.node_mut(a.id()).unwrap().inputs[0] = b.output();
    let map = Map::new(model, x.id(), vec![b.output()]).unwrap();

    match lower(&map, &options()) {
        Err(CompileError::Graph(GraphError::Cycle(path))) => {
            assert!(path.contains(&a.id()));
            assert!(path.contains(&b.id()));
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn test_long_cast_chain_compiles_and_runs() {
    const DEPTH: usize = 50_000;
    let mut model = Model::new();
    let x = input(&mut model, 2, ElementType::Real);
    let mut last = x.output();
    for i in 0..DEPTH {
        let target = if i % 2 == 0 {
            ElementType::SmallReal
        } else {
            ElementType::Real
        };
        last = cast(&mut model, last, target).output();
    }
    let map = Map::new(model, x.id(), vec![last]).unwrap();

    let graph = lower(&map, &options()).unwrap();
    assert_eq!(graph.order.len(), DEPTH + 1);
    assert_eq!(graph.steps.len(), DEPTH);

    let mut artifact = compile(&map, CompileTarget::default(), &options()).unwrap();
    assert_eq!(artifact.compute(&[1.5f64, -0.25]).unwrap(), vec![1.5, -0.25]);

    let mut interpreted = map.interpret().unwrap();
    assert_eq!(interpreted.compute(&[1.5f64, -0.25]).unwrap(), vec![1.5, -0.25]);
}

#[test]
fn test_reachable_foreign_input_is_rejected() {
    let builder = ModelBuilder::new();
    let mut model = Model::new();
    let x = input(&mut model, 2, ElementType::Real);
    let other = builder
        .add_input_node(&mut model, Shape::scalar(), ElementType::Integer)
        .unwrap();
    let gru = builder
        .add_gru_layer_node(
            &mut model,
            x.output(),
            other.output(),
            GruParameters::uniform(2, 2, 0.1, 0.0, ElementType::Real),
        )
        .unwrap();
    let map = Map::new(model, x.id(), vec![gru.output()]).unwrap();

    assert_eq!(
        lower(&map, &options()).unwrap_err(),
        CompileError::UnboundInputNode(other.id())
    );
}

#[test]
fn test_unreachable_nodes_are_not_scheduled() {
    let mut model = Model::new();
    let x = input(&mut model, 4, ElementType::Real);
    let used = cast(&mut model, x.output(), ElementType::SmallReal);
    let back = cast(&mut model, used.output(), ElementType::Real);
    let unused = vad(&mut model, x.output());
    let map = Map::new(model, x.id(), vec![back.output()]).unwrap();

    let graph = lower(&map, &options()).unwrap();
    assert!(!graph.order.contains(&unused.id()));
    assert_eq!(graph.stateful_nodes().count(), 0);
}

#[test]
fn test_target_and_options_are_forwarded() {
    let mut model = Model::new();
    let x = input(&mut model, 4, ElementType::Real);
    let map = Map::new(model, x.id(), vec![x.output()]).unwrap();

    let target = CompileTarget::new("x86_64-unknown-linux-gnu", "detector", "step");
    let options = MapCompilerOptions::default()
        .with_blas(true)
        .with_optimizer(OptimizerOptions {
            fold_identity_casts: true,
            passes: vec!["dce".to_string()],
        });

    let artifact = map.compile(target.clone(), &options).unwrap();
    assert_eq!(artifact.target(), &target);
    assert_eq!(artifact.options(), &options);
    assert_eq!(artifact.schedule().passes, vec!["dce".to_string()]);
}

#[derive(Default)]
struct Recorder {
    calls: usize,
}

impl CodeEmitter for Recorder {
    type Artifact = (String, usize);

    fn emit(
        &mut self,
        graph: ScheduledGraph,
        target: &CompileTarget,
        _options: &MapCompilerOptions,
    ) -> Result<Self::Artifact, CompileError> {
        self.calls += 1;
        Ok((target.function_name.clone(), graph.steps.len()))
    }
}

#[test]
fn test_custom_emitter_receives_schedule() {
    let mut model = Model::new();
    let x = input(&mut model, 8, ElementType::Real);
    let flag = vad(&mut model, x.output());
    let back = cast(&mut model, flag.output(), ElementType::Real);
    let map = Map::new(model, x.id(), vec![back.output()]).unwrap();

    let mut recorder = Recorder::default();
    let emitted = compile_with(&map, CompileTarget::default(), &options(), &mut recorder).unwrap();
    assert_eq!(emitted, ("predict".to_string(), 2));
    assert_eq!(recorder.calls, 1);
}

#[test]
fn test_failed_lowering_emits_nothing() {
    let mut model = Model::new();
    let x = input(&mut model, 8, ElementType::Real);
    let map = Map::new(model, x.id(), vec![]).unwrap();

    let mut recorder = Recorder::default();
    assert!(compile_with(&map, CompileTarget::default(), &options(), &mut recorder).is_err());
    assert_eq!(recorder.calls, 0);
}

#[test]
fn test_validate_rejects_read_before_write() {
    let mut model = Model::new();
    let x = input(&mut model, 8, ElementType::SmallReal);
    let flag = vad(&mut model, x.output());
    let back = cast(&mut model, flag.output(), ElementType::SmallReal);
    let map = Map::new(model, x.id(), vec![back.output()]).unwrap();

    let mut graph = lower(&map, &options()).unwrap();
    graph.steps.swap(0, 1);
    assert!(graph.validate().is_err());
}

#[test]
fn test_error_messages() {
    let err = CompileError::UnsupportedTypeCombination {
        context: "map output",
        expected: ElementType::Real,
        found: ElementType::Integer,
    };
    assert_eq!(
        err.to_string(),
        "map output: no conversion from integer to real without an explicit TypeCastNode"
    );
    assert_eq!(
        CompileError::EmptyOutputSelection.to_string(),
        "map selects no outputs"
    );
}
