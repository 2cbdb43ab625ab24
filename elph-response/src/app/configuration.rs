use crate::{occupations::Smearing, ResponseError};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::{env, path::Path, path::PathBuf};

/// Evaluator parameters, layered from configuration files and the environment
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Configuration {
    pub global: GlobalConfiguration,
    pub susceptibility: SusceptibilityConfiguration,
    pub polarization: PolarizationConfiguration,
    pub self_energy: SelfEnergyConfiguration,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GlobalConfiguration {
    /// A `tracing` filter directive, overridden by `RUST_LOG` when set
    pub log_level: String,
    /// If present, JSON logs are also written to `elph-response.log` in this directory
    pub log_directory: Option<PathBuf>,
}

impl Default for GlobalConfiguration {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_directory: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SusceptibilityConfiguration {
    /// Temperature in Kelvin
    pub temperature: f64,
    /// Lorentzian broadening of the energy denominators in eV
    pub broadening: f64,
    pub smearing: Smearing,
}

impl Default for SusceptibilityConfiguration {
    fn default() -> Self {
        Self {
            temperature: 1_f64,
            broadening: 1e-10,
            smearing: Smearing::FermiDirac,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolarizationConfiguration {
    /// Temperature in Kelvin
    pub temperature: f64,
    /// Imaginary part added to the energy denominators in eV
    pub regulariser: f64,
    pub smearing: Smearing,
}

impl Default for PolarizationConfiguration {
    fn default() -> Self {
        Self {
            temperature: 1_f64,
            regulariser: 1e-10,
            smearing: Smearing::FermiDirac,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelfEnergyConfiguration {
    /// Temperature in Kelvin
    pub temperature: f64,
    /// Imaginary part added to the energy denominators in eV
    pub regulariser: f64,
    pub smearing: Smearing,
    /// In-process workers used by `PhononSelfEnergyEvaluator::evaluate_configured`
    pub number_of_workers: usize,
}

impl Default for SelfEnergyConfiguration {
    fn default() -> Self {
        Self {
            temperature: 100_f64,
            regulariser: 1e-10,
            smearing: Smearing::FermiDirac,
            number_of_workers: 1,
        }
    }
}

impl Configuration {
    /// Builds the configuration from `directory/default.toml`, the optional override
    /// `directory/{RUN_MODE}.toml` and `ELPH_`-prefixed environment variables, in increasing
    /// order of precedence
    ///
    /// Section and key of an environment override are separated by a double underscore.
    pub fn build(directory: impl AsRef<Path>) -> Result<Self, ResponseError> {
        let directory = directory.as_ref();
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::from(directory.join("default")).required(false))
            .add_source(File::from(directory.join(run_mode)).required(false))
            .add_source(Environment::with_prefix("ELPH").separator("__"))
            .build()?;

        Ok(s.try_deserialize()?)
    }

    /// Builds the configuration from a TOML document
    pub fn from_toml(source: &str) -> Result<Self, ResponseError> {
        let s = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;

        Ok(s.try_deserialize()?)
    }
}

#[cfg(test)]
mod test {
    use super::Configuration;
    use crate::occupations::Smearing;

    #[test]
    fn empty_document_gives_the_defaults() {
        let config = Configuration::from_toml("").unwrap();
        assert_eq!(config, Configuration::default());
        assert_eq!(config.self_energy.temperature, 100.);
        assert_eq!(config.susceptibility.broadening, 1e-10);
    }

    #[test]
    fn sections_override_their_own_defaults() {
        let config = Configuration::from_toml(
            r#"
            [global]
            log_level = "debug"

            [polarization]
            temperature = 300.0
            smearing = "marzari_vanderbilt"

            [self_energy]
            regulariser = 1e-6
            number_of_workers = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.global.log_level, "debug");
        assert_eq!(config.polarization.temperature, 300.);
        assert_eq!(config.polarization.regulariser, 1e-10);
        assert_eq!(config.polarization.smearing, Smearing::MarzariVanderbilt);
        assert_eq!(config.self_energy.regulariser, 1e-6);
        assert_eq!(config.self_energy.number_of_workers, 4);
        assert_eq!(config.self_energy.smearing, Smearing::FermiDirac);
    }

    #[test]
    fn unknown_smearing_is_rejected() {
        let result = Configuration::from_toml(
            r#"
            [susceptibility]
            smearing = "bose_einstein"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn missing_directory_falls_back_to_defaults() {
        let config = Configuration::build("this/directory/does/not/exist").unwrap();
        assert_eq!(config.susceptibility, Configuration::default().susceptibility);
    }
}
