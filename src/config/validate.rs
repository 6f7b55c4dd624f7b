// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DispatchError, Result};
use crate::types::FramesModeKind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DispatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.dispatch, raw.context, raw.node))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_nodes(cfg)?;
    validate_dispatch_section(cfg)?;
    validate_node_references(cfg)?;
    validate_node_settings(cfg)?;
    // Cycles are reported by the graph builder, with the offending task.
    Ok(())
}

fn ensure_has_nodes(cfg: &RawConfigFile) -> Result<()> {
    if cfg.node.is_empty() {
        return Err(DispatchError::Config(
            "config must contain at least one [node.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_dispatch_section(cfg: &RawConfigFile) -> Result<()> {
    let dispatch = &cfg.dispatch;

    if dispatch.frames_mode == FramesModeKind::Custom && dispatch.frames.is_empty() {
        return Err(DispatchError::Config(
            "[dispatch].frames must list at least one frame when frames_mode = \"custom\""
                .to_string(),
        ));
    }

    if let Some([start, end]) = dispatch.frame_range {
        if start > end {
            return Err(DispatchError::Config(format!(
                "[dispatch].frame_range start ({start}) is after its end ({end})"
            )));
        }
    }

    if dispatch.job_name.contains(['/', '\\']) {
        return Err(DispatchError::Config(format!(
            "[dispatch].job_name must not contain path separators (got '{}')",
            dispatch.job_name
        )));
    }

    Ok(())
}

fn validate_node_references(cfg: &RawConfigFile) -> Result<()> {
    for (name, node) in cfg.node.iter() {
        let lists = [("pre_tasks", &node.pre_tasks), ("post_tasks", &node.post_tasks)];
        for (field, deps) in lists {
            for dep in deps.iter() {
                if !cfg.node.contains_key(dep) {
                    return Err(DispatchError::Config(format!(
                        "node '{}' has unknown reference '{}' in `{}`",
                        name, dep, field
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_node_settings(cfg: &RawConfigFile) -> Result<()> {
    for (name, node) in cfg.node.iter() {
        if node.batch_size == 0 {
            return Err(DispatchError::Config(format!(
                "node '{}' has batch_size = 0 (must be >= 1)",
                name
            )));
        }
    }
    Ok(())
}
