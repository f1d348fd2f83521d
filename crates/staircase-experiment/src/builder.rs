//! Interactive configuration builder.
//!
//! Walks the operator through every experiment setting and produces a
//! validated [`ExperimentConfig`] ready to be saved as TOML.

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use staircase_kernel::config::{
    ExperimentConfig, ExperimentSection, StaircaseDefaults, StaircaseEntry, SwapPolicy,
};
use tracing::debug;

use crate::prompt::Prompter;

/// A configuration built interactively, with the file it should be saved to
/// unless the operator chose another path.
#[derive(Debug, Clone)]
pub struct BuiltConfig {
    pub config: ExperimentConfig,
    pub default_path: PathBuf,
}

/// Default config file location: `<name>.toml` beside the data directory.
pub fn default_config_path(name: &str, data_path: &Path) -> PathBuf {
    let file_name = format!("{}.toml", name.trim().to_lowercase().replace(' ', "_"));
    let parent = data_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    parent.join(file_name)
}

/// Ask for every setting. Returns `Ok(None)` if the operator quits.
pub fn build_config<R: BufRead, W: Write>(prompter: &mut Prompter<R, W>) -> Result<Option<BuiltConfig>> {
    prompter.say("Staircase Experiment Setup")?;

    let Some(name) = prompter.ask("Experiment Name")? else {
        return Ok(None);
    };
    let Some(path) = ask_data_directory(prompter)? else {
        return Ok(None);
    };

    let staircase_count = loop {
        let Some(count) = prompter.ask_number::<i64>("Number of Staircases")? else {
            return Ok(None);
        };
        if count < 1 {
            prompter.say("Please enter a valid number of Staircases (greater than 0)")?;
            continue;
        }
        break count as usize;
    };

    let Some(units) = prompter.ask("Unit Descriptor (e.g. gram, millimetre)")? else {
        return Ok(None);
    };
    let Some(comparison) = prompter.ask("Greater Value in Unit Descriptor (e.g. Heavier, Thicker)")? else {
        return Ok(None);
    };
    let Some(reversals_to_step_change) =
        ask_positive(prompter, "Number of Correct Trials to Increase Difficulty")?
    else {
        return Ok(None);
    };
    let Some(step_up) =
        ask_step(prompter, &format!("Difficulty Increase Step Size ({})", units))?
    else {
        return Ok(None);
    };
    let Some(step_down) =
        ask_step(prompter, &format!("Difficulty Decrease Step Size ({})", units))?
    else {
        return Ok(None);
    };
    let Some(reference) = prompter.ask_number::<f64>("Reference Value")? else {
        return Ok(None);
    };

    let swap_policy = if staircase_count > 1 {
        let options: Vec<String> = SwapPolicy::all()
            .iter()
            .map(|p| capitalize(p.name()))
            .collect();
        let options: Vec<&str> = options.iter().map(String::as_str).collect();
        let Some(choice) = prompter.ask_choice("Staircase Swap Criteria", &options)? else {
            return Ok(None);
        };
        choice.parse()?
    } else {
        SwapPolicy::Serial
    };

    let Some(reversals_to_finish) = ask_positive(prompter, "Reversals Count to end the Staircase")? else {
        return Ok(None);
    };
    let Some(first_error) =
        prompter.ask_choice("Only Start Staircase rule after first error?", &["Y", "N"])?
    else {
        return Ok(None);
    };

    let mut staircases = Vec::with_capacity(staircase_count);
    for i in 1..=staircase_count {
        let prompt = format!("Please enter the Initial Test Value for Staircase {}", i);
        let start_value = loop {
            let Some(value) = prompter.ask_number::<f64>(&prompt)? else {
                return Ok(None);
            };
            if value == reference {
                prompter.say("The initial value must differ from the reference value")?;
                continue;
            }
            break value;
        };
        staircases.push(StaircaseEntry { start_value });
    }

    let config = ExperimentConfig {
        experiment: ExperimentSection {
            name: name.clone(),
            path: path.clone(),
            staircase_count,
            swap_policy,
            seed: None,
        },
        staircase_defaults: StaircaseDefaults {
            units,
            comparison,
            step_up,
            step_down,
            reference,
            reversals_to_step_change,
            reversals_to_finish,
            require_first_error: first_error == "Y",
        },
        staircases,
    };
    config.validate()?;

    Ok(Some(BuiltConfig {
        default_path: default_config_path(&name, &path),
        config,
    }))
}

/// Ask for the data directory, creating it when missing.
fn ask_data_directory<R: BufRead, W: Write>(prompter: &mut Prompter<R, W>) -> Result<Option<PathBuf>> {
    loop {
        let Some(answer) = prompter.ask("Save Data Directory")? else {
            return Ok(None);
        };
        let path = PathBuf::from(answer);
        if path.is_file() {
            prompter.say(&format!(
                "The selected path ({}) is a file. Please enter a path that does not exist, or is a directory",
                path.display()
            ))?;
            continue;
        }
        if !path.exists() {
            if let Err(e) = fs::create_dir_all(&path) {
                debug!(error = %e, "Failed to create data directory");
                prompter.say(&format!(
                    "Unable to create the directory {}. Please try again",
                    path.display()
                ))?;
                continue;
            }
        }
        return Ok(Some(path));
    }
}

fn ask_positive<R: BufRead, W: Write>(prompter: &mut Prompter<R, W>, prompt: &str) -> Result<Option<u32>> {
    loop {
        let Some(value) = prompter.ask_number::<u32>(prompt)? else {
            return Ok(None);
        };
        if value == 0 {
            prompter.say("Please enter a value greater than 0")?;
            continue;
        }
        return Ok(Some(value));
    }
}

fn ask_step<R: BufRead, W: Write>(prompter: &mut Prompter<R, W>, prompt: &str) -> Result<Option<f64>> {
    loop {
        let Some(value) = prompter.ask_number::<f64>(prompt)? else {
            return Ok(None);
        };
        if value == 0.0 || !value.is_finite() {
            prompter.say("Please enter a non-zero step size")?;
            continue;
        }
        return Ok(Some(value));
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
