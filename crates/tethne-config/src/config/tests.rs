#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_defaults_match_published_tap_parameters() {
        let tap = TapConfig::default();
        assert_eq!(tap.max_iterations, 500);
        assert_eq!(tap.stability_window, 50);
        assert!((tap.epsilon - 1e-5).abs() < 1e-12);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = TethneConfig::from_toml_str(
            r#"
            [lda]
            num_topics = 5

            [mallet]
            path = "/opt/mallet/bin/mallet"
            "#,
        )
        .unwrap();
        assert_eq!(config.lda.num_topics, 5);
        assert_eq!(config.lda.iterations, default_lda_iterations());
        assert_eq!(config.mallet.path, PathBuf::from("/opt/mallet/bin/mallet"));
        assert_eq!(config.corpus.index_by, "ayjid");
        assert_eq!(config.logging.filter, "tethne=info");
    }

    #[test]
    fn test_invalid_damping_rejected() {
        let err = TethneConfig::from_toml_str("[tap]\ndamping = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("tap.damping"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TethneConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.dtm.path, PathBuf::from("dtm"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tethne.toml");
        std::fs::write(&path, "[corpus]\nindex_by = \"wosid\"\n").unwrap();
        let config = TethneConfig::load_from(&path).unwrap();
        assert_eq!(config.corpus.index_by, "wosid");
        assert_eq!(config.corpus.index_features, vec!["authors", "citations"]);
    }
}
