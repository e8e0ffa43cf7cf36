//! JSON input files: body and motion descriptions.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use kinfault_body::{Body, BodyDescription, MotionDescription, MotionTrajectory};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::CliError;

pub fn load_body(path: &Path) -> Result<Body, CliError> {
    let desc: BodyDescription = read_json(path)?;
    let body = Body::from_description(desc)?;
    debug!(
        body = %body.name(),
        links = body.num_links(),
        joints = body.num_joints(),
        "body loaded"
    );
    Ok(body)
}

pub fn load_motion(path: &Path) -> Result<MotionTrajectory, CliError> {
    let desc: MotionDescription = read_json(path)?;
    let motion = MotionTrajectory::from_description(desc)?;
    debug!(
        frames = motion.num_frames(),
        frame_rate = motion.frame_rate(),
        link_poses = motion.link_poses().is_some(),
        "motion loaded"
    );
    Ok(motion)
}

/// Map link names to link indices.  Every name must exist in `body`.
pub fn resolve_links(body: &Body, names: &[String]) -> Result<BTreeSet<usize>, CliError> {
    names
        .iter()
        .map(|name| {
            body.find_link(name)
                .ok_or_else(|| CliError::UnknownLink(name.clone()))
        })
        .collect()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let raw = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinfault_types::FaultError;

    const ARM: &str = r#"{
        "name": "arm",
        "links": [
            { "name": "BASE" },
            { "name": "J0", "parent": "BASE",
              "joint": { "type": "revolute", "q_lower": -1.0, "q_upper": 1.0 } },
            { "name": "J1", "parent": "J0",
              "offset": { "translation": { "x": 0.3, "y": 0.0, "z": 0.0 } },
              "joint": { "type": "prismatic", "q_lower": 0.0, "q_upper": 0.2 } }
        ]
    }"#;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_body_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let body = load_body(&write(&dir, "arm.json", ARM)).unwrap();
        assert_eq!(body.name(), "arm");
        assert_eq!(body.num_links(), 3);
        assert_eq!(body.num_joints(), 2);
    }

    #[test]
    fn loads_motion_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "motion.json",
            r#"{ "frame_rate": 10.0, "joint_positions": [[0.0, 0.1], [0.2, 0.1], [0.4, 0.1]] }"#,
        );
        let motion = load_motion(&path).unwrap();
        assert_eq!(motion.num_frames(), 3);
        assert!((motion.time_length() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_body(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_motion(&write(&dir, "bad.json", "{ \"frame_rate\": ")).unwrap_err();
        assert!(matches!(err, CliError::Json { .. }));
    }

    #[test]
    fn invalid_motion_is_rejected_by_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "ragged.json",
            r#"{ "frame_rate": 10.0, "joint_positions": [[0.0, 0.1], [0.2]] }"#,
        );
        let err = load_motion(&path).unwrap_err();
        assert!(matches!(err, CliError::Fault(FaultError::InvalidMotion(_))));
    }

    #[test]
    fn resolves_link_names() {
        let dir = tempfile::tempdir().unwrap();
        let body = load_body(&write(&dir, "arm.json", ARM)).unwrap();
        let picked = resolve_links(&body, &["J1".to_string(), "BASE".to_string()]).unwrap();
        assert_eq!(picked.into_iter().collect::<Vec<_>>(), vec![0, 2]);

        let err = resolve_links(&body, &["ELBOW".to_string()]).unwrap_err();
        assert!(matches!(err, CliError::UnknownLink(name) if name == "ELBOW"));
    }
}
