//! INI file configuration adapter.

use crate::domain::error::BackledgerError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BackledgerError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| BackledgerError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const FULL: &str = r#"
[backtest]
id = bt-2024-h1
venue = upbit
instrument = KRW-BTC
start_date = 2024-01-01
end_date = 2024-06-30
initial_balance = 10000000
record_initial_deposit = yes

[fee]
type = percent
amount = 0.0005

[strategy]
name = volatility_breakout
k = 0.5
entry_offset_hours = 6

[data]
source = sqlite

[sqlite]
path = /var/lib/backledger/prices.db
pool_size = 2

[postgres]
connection_string = host=localhost user=bt dbname=prices
"#;

    #[test]
    fn from_string_parses_all_sections() {
        let adapter = FileConfigAdapter::from_string(FULL).unwrap();
        assert_eq!(adapter.get_string("backtest", "id"), Some("bt-2024-h1".to_string()));
        assert_eq!(
            adapter.get_string("postgres", "connection_string"),
            Some("host=localhost user=bt dbname=prices".to_string())
        );
        assert_eq!(adapter.get_double("backtest", "initial_balance", 0.0), 10_000_000.0);
        assert!(adapter.get_bool("backtest", "record_initial_deposit", false));
        assert_eq!(adapter.get_double("fee", "amount", 0.0), 0.0005);
        assert_eq!(adapter.get_double("strategy", "k", 0.7), 0.5);
        assert_eq!(adapter.get_int("sqlite", "pool_size", 4), 2);
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[backtest]\nid = a\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_string_or_falls_back_on_blank() {
        let adapter = FileConfigAdapter::from_string("[backtest]\nvenue =\n").unwrap();
        assert_eq!(adapter.get_string_or("backtest", "venue", "upbit"), "upbit");
        assert_eq!(adapter.get_string_or("data", "source", "csv"), "csv");
    }

    #[test]
    fn get_int_returns_default_for_missing_or_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[strategy]\nrsi_period = abc\n").unwrap();
        assert_eq!(adapter.get_int("strategy", "rsi_period", 14), 14);
        assert_eq!(adapter.get_int("strategy", "missing", 42), 42);
    }

    #[test]
    fn get_double_returns_default_for_missing_or_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[fee]\namount = lots\n").unwrap();
        assert_eq!(adapter.get_double("fee", "amount", 0.0005), 0.0005);
        assert_eq!(adapter.get_double("fee", "missing", 99.9), 99.9);
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[recorder]\na = true\nb = yes\nc = 1\nd = off\ne = no\nf = 0\n",
        )
        .unwrap();
        assert!(adapter.get_bool("recorder", "a", false));
        assert!(adapter.get_bool("recorder", "b", false));
        assert!(adapter.get_bool("recorder", "c", false));
        assert!(!adapter.get_bool("recorder", "d", true));
        assert!(!adapter.get_bool("recorder", "e", true));
        assert!(!adapter.get_bool("recorder", "f", true));
        assert!(adapter.get_bool("recorder", "missing", true));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[report]\noutput = out/run.csv\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("report", "output"),
            Some("out/run.csv".to_string())
        );
    }

    #[test]
    fn from_file_missing_file_is_config_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        match result {
            Err(BackledgerError::ConfigParse { file, .. }) => {
                assert_eq!(file, "/nonexistent/path/config.ini");
            }
            Err(other) => panic!("expected ConfigParse, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }
}
