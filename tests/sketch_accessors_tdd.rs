use ketchsql::{
    Accumulator as _, AggregateArg, AggregateFunction, DataType, Error, FunctionRegistry, Value,
};

fn bind(
    registry: &FunctionRegistry,
    name: &str,
    resolution: Option<i64>,
    column: DataType,
) -> std::rc::Rc<dyn AggregateFunction> {
    let mut args = Vec::new();
    if let Some(resolution) = resolution {
        args.push(AggregateArg::Constant(Value::int64(resolution)));
    }
    args.push(AggregateArg::Column(column));
    registry.bind_aggregate(name, &mut args).unwrap()
}

fn eval(registry: &FunctionRegistry, name: &str, args: &[Value]) -> Value {
    registry.get_scalar(name).unwrap().evaluate(args).unwrap()
}

fn quantile_blob(registry: &FunctionRegistry) -> Value {
    let function = bind(registry, "SKETCH_QUANTILE", Some(200), DataType::Int64);
    let mut state = function.create_accumulator();
    for i in 1..=1000 {
        state.accumulate(&Value::int64(i)).unwrap();
    }
    state.finalize().unwrap()
}

#[test]
fn test_quantile_accessors() {
    let registry = FunctionRegistry::new();
    let blob = quantile_blob(&registry);

    assert_eq!(
        eval(&registry, "SKETCH_QUANTILE_IS_EMPTY", &[blob.clone()]),
        Value::bool_val(false)
    );
    assert_eq!(
        eval(&registry, "SKETCH_QUANTILE_K", &[blob.clone()]),
        Value::int64(200)
    );
    assert_eq!(
        eval(&registry, "SKETCH_QUANTILE_N", &[blob.clone()]),
        Value::int64(1000)
    );
    assert_eq!(
        eval(&registry, "SKETCH_QUANTILE_MIN_ITEM", &[blob.clone()]),
        Value::int64(1)
    );
    assert_eq!(
        eval(&registry, "SKETCH_QUANTILE_MAX_ITEM", &[blob.clone()]),
        Value::int64(1000)
    );

    let rank = eval(
        &registry,
        "SKETCH_QUANTILE_RANK",
        &[blob.clone(), Value::int64(250), Value::bool_val(true)],
    );
    let rank = rank.as_f64().unwrap();
    assert!((rank - 0.25).abs() < 0.05, "rank {}", rank);

    let retained = eval(&registry, "SKETCH_QUANTILE_NUM_RETAINED", &[blob.clone()]);
    assert!(retained.as_i64().unwrap() > 0);

    let error = eval(
        &registry,
        "SKETCH_QUANTILE_NORMALIZED_RANK_ERROR",
        &[blob.clone(), Value::bool_val(false)],
    );
    let error = error.as_f64().unwrap();
    assert!(error > 0.0 && error < 0.05, "error {}", error);

    let describe = eval(
        &registry,
        "SKETCH_QUANTILE_DESCRIBE",
        &[blob.clone(), Value::bool_val(false)],
    );
    assert!(describe.as_str().unwrap().contains("Quantiles sketch"));
}

#[test]
fn test_quantile_cdf_and_pmf() {
    let registry = FunctionRegistry::new();
    let blob = quantile_blob(&registry);

    let splits = Value::array(vec![
        Value::int64(250),
        Value::int64(500),
        Value::int64(750),
    ]);
    let cdf = eval(
        &registry,
        "SKETCH_QUANTILE_CDF",
        &[blob.clone(), splits.clone(), Value::bool_val(true)],
    );
    let cdf = cdf.as_array().unwrap().to_vec();
    assert_eq!(cdf.len(), 4);
    assert_eq!(cdf[3], Value::float64(1.0));

    let pmf = eval(
        &registry,
        "SKETCH_QUANTILE_PMF",
        &[blob, splits, Value::bool_val(true)],
    );
    let total: f64 = pmf
        .as_array()
        .unwrap()
        .iter()
        .map(|mass| mass.as_f64().unwrap())
        .sum();
    assert!((total - 1.0).abs() < 1e-9, "pmf total {}", total);
}

#[test]
fn test_accessors_are_pure() {
    let registry = FunctionRegistry::new();
    let blob = quantile_blob(&registry);

    let args = [blob, Value::float64(0.5), Value::bool_val(true)];
    let first = eval(&registry, "SKETCH_QUANTILE_QUANTILE", &args);
    let second = eval(&registry, "SKETCH_QUANTILE_QUANTILE", &args);
    assert_eq!(first, second);
}

#[test]
fn test_float_quantile_blob_answers_float_items() {
    let registry = FunctionRegistry::new();
    let function = bind(&registry, "SKETCH_QUANTILE", Some(200), DataType::Float64);
    let mut state = function.create_accumulator();
    for i in 0..100 {
        state.accumulate(&Value::float64(i as f64 / 10.0)).unwrap();
    }
    let blob = state.finalize().unwrap();

    let max = eval(&registry, "SKETCH_QUANTILE_MAX_ITEM", &[blob]);
    assert_eq!(max, Value::float64(9.9));
}

#[test]
fn test_tdigest_accessors() {
    let registry = FunctionRegistry::new();
    let function = bind(&registry, "SKETCH_TDIGEST", Some(100), DataType::Float64);
    let mut state = function.create_accumulator();
    for i in 0..10_000 {
        state.accumulate(&Value::float64(i as f64)).unwrap();
    }
    let blob = state.finalize().unwrap();

    assert_eq!(
        eval(&registry, "SKETCH_TDIGEST_IS_EMPTY", &[blob.clone()]),
        Value::bool_val(false)
    );
    assert_eq!(
        eval(&registry, "SKETCH_TDIGEST_K", &[blob.clone()]),
        Value::int64(100)
    );
    assert_eq!(
        eval(&registry, "SKETCH_TDIGEST_TOTAL_WEIGHT", &[blob.clone()]),
        Value::int64(10_000)
    );

    let median = eval(
        &registry,
        "SKETCH_TDIGEST_QUANTILE",
        &[blob.clone(), Value::float64(0.5)],
    );
    let median = median.as_f64().unwrap();
    assert!((median - 5000.0).abs() < 500.0, "median {}", median);

    let rank = eval(
        &registry,
        "SKETCH_TDIGEST_RANK",
        &[blob, Value::float64(2500.0)],
    );
    let rank = rank.as_f64().unwrap();
    assert!((rank - 0.25).abs() < 0.1, "rank {}", rank);
}

#[test]
fn test_theta_set_operations() {
    let registry = FunctionRegistry::new();
    let function = bind(&registry, "SKETCH_THETA", Some(12), DataType::Int64);

    let mut left = function.create_accumulator();
    for i in 0..1000 {
        left.accumulate(&Value::int64(i)).unwrap();
    }
    let left = left.finalize().unwrap();

    let mut right = function.create_accumulator();
    for i in 500..1500 {
        right.accumulate(&Value::int64(i)).unwrap();
    }
    let right = right.finalize().unwrap();

    let both = eval(
        &registry,
        "SKETCH_THETA_INTERSECT",
        &[left.clone(), right.clone()],
    );
    let both_estimate = eval(&registry, "SKETCH_THETA_ESTIMATE", &[both]);
    assert_eq!(both_estimate, Value::float64(500.0));

    let only_left = eval(&registry, "SKETCH_THETA_A_NOT_B", &[left.clone(), right]);
    let only_left_estimate = eval(&registry, "SKETCH_THETA_ESTIMATE", &[only_left]);
    assert_eq!(only_left_estimate, Value::float64(500.0));

    let lower = eval(
        &registry,
        "SKETCH_THETA_LOWER_BOUND",
        &[left.clone(), Value::int64(2)],
    );
    let upper = eval(&registry, "SKETCH_THETA_UPPER_BOUND", &[left, Value::int64(2)]);
    assert!(lower.as_f64().unwrap() <= 1000.0);
    assert!(upper.as_f64().unwrap() >= 1000.0);
}

#[test]
fn test_theta_bounds_reject_bad_std_devs() {
    let registry = FunctionRegistry::new();
    let function = bind(&registry, "SKETCH_THETA", None, DataType::Int64);
    let mut state = function.create_accumulator();
    state.accumulate(&Value::int64(1)).unwrap();
    let blob = state.finalize().unwrap();

    let err = registry
        .get_scalar("SKETCH_THETA_LOWER_BOUND")
        .unwrap()
        .evaluate(&[blob, Value::int64(7)])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)), "{}", err);
}

#[test]
fn test_freq_items_report() {
    let registry = FunctionRegistry::new();
    let function = bind(&registry, "SKETCH_FREQ_ITEMS", Some(8), DataType::String);
    let mut state = function.create_accumulator();
    for _ in 0..100 {
        state.accumulate(&Value::string("heavy")).unwrap();
    }
    for _ in 0..40 {
        state.accumulate(&Value::string("medium")).unwrap();
    }
    for i in 0..20 {
        state.accumulate(&Value::string(format!("light-{}", i))).unwrap();
    }
    let blob = state.finalize().unwrap();

    assert_eq!(
        eval(&registry, "SKETCH_FREQ_ITEMS_TOTAL_WEIGHT", &[blob.clone()]),
        Value::int64(160)
    );
    assert_eq!(
        eval(
            &registry,
            "SKETCH_FREQ_ITEMS_ESTIMATE",
            &[blob.clone(), Value::string("heavy")]
        ),
        Value::int64(100)
    );
    assert_eq!(
        eval(
            &registry,
            "SKETCH_FREQ_ITEMS_LOWER_BOUND",
            &[blob.clone(), Value::string("missing")]
        ),
        Value::int64(0)
    );

    let epsilon = eval(&registry, "SKETCH_FREQ_ITEMS_EPSILON", &[blob.clone()]);
    assert!(epsilon.as_f64().unwrap() > 0.0);

    let report = eval(&registry, "SKETCH_FREQ_ITEMS_FREQUENT_ITEMS", &[blob]);
    let rows = report.as_array().unwrap();
    assert!(!rows.is_empty());
    let first = rows[0].as_struct().unwrap();
    assert_eq!(first[0], ("value".to_string(), Value::string("heavy")));
    assert_eq!(first[1], ("estimate".to_string(), Value::int64(100)));
}

#[test]
fn test_accessor_rejects_garbage_blob() {
    let registry = FunctionRegistry::new();
    let garbage = Value::bytes(b"garbage".to_vec());
    for name in [
        "SKETCH_QUANTILE_N",
        "SKETCH_TDIGEST_QUANTILE",
        "SKETCH_HLL_ESTIMATE",
        "SKETCH_THETA_ESTIMATE",
        "SKETCH_FREQ_ITEMS_TOTAL_WEIGHT",
    ] {
        let function = registry.get_scalar(name).unwrap();
        let args: Vec<Value> = if name == "SKETCH_TDIGEST_QUANTILE" {
            vec![garbage.clone(), Value::float64(0.5)]
        } else {
            vec![garbage.clone()]
        };
        let err = function.evaluate(&args).unwrap_err();
        assert!(matches!(err, Error::MalformedSketch(_)), "{}: {}", name, err);
    }
}

#[test]
fn test_accessor_rejects_foreign_family() {
    let registry = FunctionRegistry::new();
    let blob = quantile_blob(&registry);
    let err = registry
        .get_scalar("SKETCH_HLL_ESTIMATE")
        .unwrap()
        .evaluate(&[blob])
        .unwrap_err();
    assert!(matches!(err, Error::MalformedSketch(_)), "{}", err);
}

#[test]
fn test_accessor_rejects_out_of_range_rank() {
    let registry = FunctionRegistry::new();
    let blob = quantile_blob(&registry);
    let err = registry
        .get_scalar("SKETCH_QUANTILE_QUANTILE")
        .unwrap()
        .evaluate(&[blob, Value::float64(1.5), Value::bool_val(true)])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)), "{}", err);
}
