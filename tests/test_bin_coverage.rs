use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp config");
    file.write_all(contents.as_bytes())
        .expect("failed to write temp config");
    file
}

#[allow(dead_code)]
mod sparse_ae_bin {
    include!("../sparse_ae.rs");

    #[cfg(test)]
    mod coverage_tests {
        use super::*;
        use ndarray::Array2;
        use rust_sparse_autoencoder::cluster::run_local_cluster_on;
        use rust_sparse_autoencoder::utils::SimpleRng;

        const CONFIG: &str = r#"{
  "visible_size": 3,
  "hidden_layer_sizes": [2],
  "learning_method": "dsgd",
  "rounds": 2,
  "learning_rate": 0.1,
  "workers": 1
}"#;

        #[test]
        fn test_args_parse_overrides() {
            let args = Args::try_parse_from(["sparse_ae", "cfg.json", "--workers", "4", "--seed", "9"])
                .unwrap();
            assert_eq!(args.config, PathBuf::from("cfg.json"));
            assert_eq!(args.workers, Some(4));
            assert_eq!(args.seed, Some(9));
        }

        #[test]
        fn test_args_require_config_path() {
            assert!(Args::try_parse_from(["sparse_ae"]).is_err());
        }

        #[test]
        fn test_prepare_config_applies_overrides() {
            let temp = crate::write_temp_config(CONFIG);
            let args = Args {
                config: temp.path().to_path_buf(),
                workers: Some(3),
                seed: Some(11),
            };
            let config = prepare_config(&args).unwrap();
            assert_eq!(config.workers, 3);
            assert_eq!(config.seed, Some(11));

            let args = Args {
                config: temp.path().to_path_buf(),
                workers: None,
                seed: None,
            };
            let config = prepare_config(&args).unwrap();
            assert_eq!(config.workers, 1);
            assert_eq!(config.seed, None);
        }

        #[test]
        fn test_prepare_config_rejects_zero_workers() {
            let temp = crate::write_temp_config(CONFIG);
            let args = Args {
                config: temp.path().to_path_buf(),
                workers: Some(0),
                seed: None,
            };
            assert!(prepare_config(&args).is_err());
        }

        #[test]
        fn test_format_summary_lists_every_layer() {
            let temp = crate::write_temp_config(CONFIG);
            let args = Args {
                config: temp.path().to_path_buf(),
                workers: None,
                seed: Some(3),
            };
            let config = prepare_config(&args).unwrap();
            let mut rng = SimpleRng::new(2);
            let shards = vec![Array2::from_shape_fn((3, 4), |_| rng.next_f64())];
            let run = run_local_cluster_on(&config, shards).unwrap();

            let summary = format_summary(&config, &run, 0.5);
            assert!(summary.contains("Method: dsgd"));
            assert!(summary.contains("Layer sizes: [3, 2]"));
            assert!(summary.contains("Total training time: 0.50 seconds"));
            assert_eq!(summary.lines().filter(|l| l.starts_with('0')).count(), 1);
        }
    }
}
