//! Tests for configuration parsing
//!
//! This file tests the config module including:
//! - Loading valid JSON config files
//! - Defaults for missing optional fields
//! - Rejecting unknown selectors and out-of-range hyperparameters
//! - Handling invalid JSON and missing files

use rust_sparse_autoencoder::config::{load_config, LearningMethod, TrainingConfig};
use rust_sparse_autoencoder::store::StalenessPolicy;
use rust_sparse_autoencoder::utils::Activation;
use rust_sparse_autoencoder::AeError;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp config");
    file.write_all(contents.as_bytes())
        .expect("failed to write temp config");
    file
}

// ============================================================================
// Valid Config Loading Tests
// ============================================================================

mod valid_config_tests {
    use super::*;

    #[test]
    fn test_load_full_config() {
        let temp = write_temp_config(
            r#"{
  "input": "data/train.txt",
  "output": "out",
  "visible_size": 64,
  "hidden_layer_sizes": [32, 16],
  "learning_method": "mbdsgd",
  "rounds": 5,
  "learning_rate": 0.1,
  "weight_decay": 0.0001,
  "sparsity_target": 0.05,
  "sparsity_weight": 3.0,
  "mini_batch_size": 16,
  "read_batch": 2,
  "update_batch": 3,
  "bounded_staleness_enabled": true,
  "staleness_bound": 4,
  "debug_logging": true,
  "activation": "sigmoid",
  "delimiter": ",",
  "supervised": true,
  "seed": 7,
  "workers": 3
}"#,
        );
        let config = load_config(temp.path()).expect("Failed to load full config");

        assert_eq!(config.hidden_layer_sizes, vec![32, 16]);
        assert_eq!(config.method().unwrap(), LearningMethod::MiniBatchDownpourSgd);
        assert_eq!(config.activation().unwrap(), Activation::Sigmoid);
        assert_eq!(config.delimiter, ',');
        assert!(config.supervised);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.workers, 3);
        assert_eq!(config.staleness_policy(), StalenessPolicy::Bounded(4));

        let state = config.training_state().unwrap();
        assert_eq!(state.read_batch, 2);
        assert_eq!(state.update_batch, 3);
        assert_eq!(state.mini_batch_size, 16);
        assert!(state.debug);

        let objective = config.objective().unwrap();
        assert_eq!(objective.sparsity_weight, 3.0);
        assert_eq!(objective.weight_decay, 0.0001);
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let temp = write_temp_config(
            r#"{
  "visible_size": 8,
  "hidden_layer_sizes": [4],
  "learning_method": "dsgd"
}"#,
        );
        let config = load_config(temp.path()).expect("Failed to load minimal config");

        assert_eq!(config.rounds, 1);
        assert_eq!(config.learning_rate, 0.01);
        assert_eq!(config.sparsity_target, 0.05);
        assert_eq!(config.delimiter, ' ');
        assert_eq!(config.workers, 1);
        assert_eq!(config.activation().unwrap(), Activation::Sigmoid);
        assert_eq!(config.staleness_policy(), StalenessPolicy::Unbounded);
        assert!(config.input.is_none());

        let state = config.training_state().unwrap();
        assert_eq!((state.read_batch, state.update_batch), (10, 10));
    }

    #[test]
    fn test_method_names_are_case_insensitive() {
        let method: LearningMethod = "DBGD".parse().unwrap();
        assert_eq!(method, LearningMethod::BatchGradientDescent);
        assert_eq!(method.to_string(), "dbgd");
    }
}

// ============================================================================
// Invalid Config Tests
// ============================================================================

mod invalid_config_tests {
    use super::*;

    fn base() -> TrainingConfig {
        TrainingConfig {
            visible_size: 4,
            hidden_layer_sizes: vec![2],
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_unknown_activation_rejected() {
        let temp = write_temp_config(
            r#"{
  "visible_size": 4,
  "hidden_layer_sizes": [2],
  "learning_method": "dbgd",
  "activation": "softplus"
}"#,
        );
        assert!(matches!(
            load_config(temp.path()),
            Err(AeError::Configuration(_))
        ));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let cases: [fn(&mut TrainingConfig); 9] = [
            |c| c.visible_size = 0,
            |c| c.hidden_layer_sizes.clear(),
            |c| c.hidden_layer_sizes = vec![3, 0],
            |c| c.rounds = 0,
            |c| c.learning_rate = 0.0,
            |c| c.weight_decay = -1.0,
            |c| c.sparsity_weight = f64::NAN,
            |c| c.workers = 0,
            |c| {
                c.learning_method = "mbdsgd".into();
                c.mini_batch_size = 0;
            },
        ];
        for (i, mutate) in cases.iter().enumerate() {
            let mut config = base();
            mutate(&mut config);
            assert!(
                matches!(config.validate(), Err(AeError::Configuration(_))),
                "case {i} should be rejected"
            );
        }
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_sparsity_requires_sigmoid_activation() {
        for activation in ["tanh", "relu"] {
            let mut config = base();
            config.activation = Some(activation.to_string());
            config.sparsity_weight = 3.0;
            assert!(
                matches!(config.validate(), Err(AeError::Configuration(_))),
                "{activation} with a sparsity penalty should be rejected"
            );

            config.sparsity_weight = 0.0;
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_invalid_json() {
        let temp = write_temp_config("{ \"visible_size\": 4, ");
        assert!(matches!(load_config(temp.path()), Err(AeError::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config("does/not/exist.json"),
            Err(AeError::Io(_))
        ));
    }
}
