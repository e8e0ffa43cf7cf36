//! Articulated body model: links, joints, and forward kinematics.
//!
//! A [`Body`] is an ordered list of [`Link`]s forming a tree.  Link 0 is the
//! root; every other link names a parent that precedes it in the list, so a
//! single forward pass over the links is enough to propagate poses.
//!
//! A link either carries a [`Joint`] (one degree of freedom relative to its
//! parent) or is rigidly fixed to its parent.  Joint ids are assigned in link
//! order and are dense in `[0, num_joints)`.
//!
//! Bodies are normally built from a [`BodyDescription`], which is also the
//! on-disk JSON format.
//!
//! # Example
//!
//! ```rust
//! use kinfault_body::body::{Body, BodyDescription, JointDescription, LinkDescription};
//! use kinfault_body::transform::{Transform3D, Vec3};
//!
//! let desc = BodyDescription::new("arm")
//!     .with_link(LinkDescription::root("BASE"))
//!     .with_link(
//!         LinkDescription::child("UPPER", "BASE")
//!             .with_joint(JointDescription::revolute(-1.0, 1.0)),
//!     )
//!     .with_link(
//!         LinkDescription::child("LOWER", "UPPER")
//!             .with_offset(Transform3D::from_translation(Vec3::new(0.5, 0.0, 0.0)))
//!             .with_joint(JointDescription::revolute(-2.0, 2.0)),
//!     );
//!
//! let body = Body::from_description(desc).unwrap();
//! assert_eq!(body.num_links(), 3);
//! assert_eq!(body.num_joints(), 2);
//! assert_eq!(body.joint(1).name(), "LOWER");
//! ```

use std::collections::HashMap;

use kinfault_types::{FaultError, JointKind};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::transform::{Quaternion, Transform3D, Vec3};

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// Primitive collision shape, expressed in its own local frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Sphere { radius: f64 },
    Box { half_extents: Vec3 },
    /// Capsule whose axis is the local z axis; `half_length` excludes the caps.
    Capsule { radius: f64, half_length: f64 },
}

/// A collision shape attached to a link at a fixed local `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Geometry {
    pub shape: Shape,
    #[serde(default)]
    pub origin: Transform3D,
}

impl Geometry {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            origin: Transform3D::identity(),
        }
    }

    pub fn with_origin(mut self, origin: Transform3D) -> Self {
        self.origin = origin;
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Joint
// ────────────────────────────────────────────────────────────────────────────

/// Joint type together with the data its motion needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointType {
    /// Rotation of `q` radians about a unit `axis` in the joint frame.
    Revolute { axis: Vec3 },
    /// Translation of `q` meters along a unit `axis` in the joint frame.
    Prismatic { axis: Vec3 },
    /// Any other connector; contributes no motion to forward kinematics.
    Other,
}

impl JointType {
    pub fn kind(&self) -> JointKind {
        match self {
            JointType::Revolute { .. } => JointKind::Revolute,
            JointType::Prismatic { .. } => JointKind::Prismatic,
            JointType::Other => JointKind::Other,
        }
    }

    /// Transform from the joint frame to the child link frame at position `q`.
    pub fn motion(&self, q: f64) -> Transform3D {
        match *self {
            JointType::Revolute { axis } => {
                Transform3D::from_rotation(Quaternion::from_axis_angle(axis, q))
            }
            JointType::Prismatic { axis } => Transform3D::from_translation(axis.scale(q)),
            JointType::Other => Transform3D::identity(),
        }
    }
}

/// A one-degree-of-freedom joint owned by exactly one link.
///
/// `q` and `dq` are working registers; they are overwritten on every replayed
/// frame and carry no persistent meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    id: usize,
    link_index: usize,
    name: String,
    joint_type: JointType,
    q_lower: f64,
    q_upper: f64,
    dq_lower: f64,
    dq_upper: f64,
    /// Current position (rad or m).
    pub q: f64,
    /// Current velocity (rad/s or m/s).
    pub dq: f64,
}

impl Joint {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Index of the link this joint belongs to.
    pub fn link_index(&self) -> usize {
        self.link_index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn joint_type(&self) -> JointType {
        self.joint_type
    }

    pub fn kind(&self) -> JointKind {
        self.joint_type.kind()
    }

    pub fn q_lower(&self) -> f64 {
        self.q_lower
    }

    pub fn q_upper(&self) -> f64 {
        self.q_upper
    }

    pub fn dq_lower(&self) -> f64 {
        self.dq_lower
    }

    pub fn dq_upper(&self) -> f64 {
        self.dq_upper
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Link
// ────────────────────────────────────────────────────────────────────────────

/// A rigid link of the body tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    index: usize,
    name: String,
    parent: Option<usize>,
    offset: Transform3D,
    joint: Option<usize>,
    geometry: Vec<Geometry>,
    /// Current world (body-frame) pose; a working register like `Joint::q`.
    pub pose: Transform3D,
}

impl Link {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent link index; `None` only for the root.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Fixed transform from the parent link frame to this link's joint frame.
    pub fn offset(&self) -> Transform3D {
        self.offset
    }

    /// Id of the joint driving this link, if any.
    pub fn joint_id(&self) -> Option<usize> {
        self.joint
    }

    pub fn geometry(&self) -> &[Geometry] {
        &self.geometry
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Body
// ────────────────────────────────────────────────────────────────────────────

/// An articulated body: a tree of links connected by joints.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    name: String,
    links: Vec<Link>,
    joints: Vec<Joint>,
    static_model: bool,
}

impl Body {
    /// Validate `desc` and build the body.  All joint positions start at 0
    /// and poses are initialised by one forward-kinematics pass.
    ///
    /// # Errors
    ///
    /// Returns [`FaultError::InvalidBody`] when the link list is empty, a
    /// name is duplicated, a parent is missing or does not precede its
    /// child, a second root is declared, a joint axis is zero, a limit
    /// pair is inverted, or an offset or geometry origin has a zero or
    /// non-finite rotation.  Non-unit rotations are rescaled to unit length.
    pub fn from_description(desc: BodyDescription) -> Result<Self, FaultError> {
        if desc.links.is_empty() {
            return Err(FaultError::InvalidBody(format!(
                "body '{}' has no links",
                desc.name
            )));
        }

        let mut index_of: HashMap<String, usize> = HashMap::new();
        let mut links = Vec::with_capacity(desc.links.len());
        let mut joints = Vec::new();

        for (index, link_desc) in desc.links.into_iter().enumerate() {
            if index_of.contains_key(&link_desc.name) {
                return Err(FaultError::InvalidBody(format!(
                    "duplicate link name '{}'",
                    link_desc.name
                )));
            }

            let parent = match (&link_desc.parent, index) {
                (None, 0) => None,
                (None, _) => {
                    return Err(FaultError::InvalidBody(format!(
                        "link '{}' has no parent but is not the first link",
                        link_desc.name
                    )));
                }
                (Some(p), 0) => {
                    return Err(FaultError::InvalidBody(format!(
                        "root link '{}' must not have a parent (got '{p}')",
                        link_desc.name
                    )));
                }
                (Some(p), _) => Some(*index_of.get(p).ok_or_else(|| {
                    FaultError::InvalidBody(format!(
                        "parent '{p}' of link '{}' is unknown or declared after it",
                        link_desc.name
                    ))
                })?),
            };

            let joint = match link_desc.joint {
                Some(jd) => {
                    let id = joints.len();
                    joints.push(jd.build(id, index, &link_desc.name)?);
                    Some(id)
                }
                None => None,
            };

            let offset = link_desc.offset.normalized().ok_or_else(|| {
                FaultError::InvalidBody(format!(
                    "link '{}' has an invalid offset transform",
                    link_desc.name
                ))
            })?;
            let geometry = link_desc
                .geometry
                .into_iter()
                .map(|g| {
                    let origin = g.origin.normalized().ok_or_else(|| {
                        FaultError::InvalidBody(format!(
                            "geometry on link '{}' has an invalid origin transform",
                            link_desc.name
                        ))
                    })?;
                    Ok(Geometry { origin, ..g })
                })
                .collect::<Result<Vec<_>, FaultError>>()?;

            index_of.insert(link_desc.name.clone(), index);
            links.push(Link {
                index,
                name: link_desc.name,
                parent,
                offset,
                joint,
                geometry,
                pose: Transform3D::identity(),
            });
        }

        let mut body = Self {
            name: desc.name,
            links,
            joints,
            static_model: desc.static_model,
        };
        body.calc_forward_kinematics();
        Ok(body)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    /// A static model has no articulation to check: it is either declared
    /// static or has no joints at all.
    pub fn is_static_model(&self) -> bool {
        self.static_model || self.joints.is_empty()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// # Panics
    ///
    /// Panics if `index >= num_links()`.
    pub fn link(&self, index: usize) -> &Link {
        &self.links[index]
    }

    /// # Panics
    ///
    /// Panics if `index >= num_links()`.
    pub fn link_mut(&mut self, index: usize) -> &mut Link {
        &mut self.links[index]
    }

    /// # Panics
    ///
    /// Panics if `id >= num_joints()`.
    pub fn joint(&self, id: usize) -> &Joint {
        &self.joints[id]
    }

    /// # Panics
    ///
    /// Panics if `id >= num_joints()`.
    pub fn joint_mut(&mut self, id: usize) -> &mut Joint {
        &mut self.joints[id]
    }

    pub fn root_link(&self) -> &Link {
        &self.links[0]
    }

    pub fn root_link_mut(&mut self) -> &mut Link {
        &mut self.links[0]
    }

    /// Look up a link index by name.
    pub fn find_link(&self, name: &str) -> Option<usize> {
        self.links.iter().position(|l| l.name == name)
    }

    /// Propagate the root pose and current joint positions to every link.
    ///
    /// The root pose is taken as-is; every other link gets
    /// `parent.pose ∘ offset ∘ joint_motion(q)`.
    pub fn calc_forward_kinematics(&mut self) {
        for i in 1..self.links.len() {
            let Some(parent) = self.links[i].parent else {
                continue;
            };
            let parent_pose = self.links[parent].pose;
            let motion = match self.links[i].joint {
                Some(id) => {
                    let joint = &self.joints[id];
                    joint.joint_type.motion(joint.q)
                }
                None => Transform3D::identity(),
            };
            let link = &mut self.links[i];
            link.pose = parent_pose.compose(link.offset).compose(motion);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Descriptions (on-disk format)
// ────────────────────────────────────────────────────────────────────────────

/// Serializable description of a [`Body`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BodyDescription {
    pub name: String,
    /// Declare the model static (never articulated) regardless of its joints.
    #[serde(default)]
    pub static_model: bool,
    /// Links in tree order; the first entry is the root.
    pub links: Vec<LinkDescription>,
}

impl BodyDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            static_model: false,
            links: Vec::new(),
        }
    }

    pub fn with_link(mut self, link: LinkDescription) -> Self {
        self.links.push(link);
        self
    }

    pub fn with_static_model(mut self, static_model: bool) -> Self {
        self.static_model = static_model;
        self
    }
}

/// Serializable description of one [`Link`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LinkDescription {
    pub name: String,
    /// Name of the parent link; omitted for the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Parent frame → joint frame.
    #[serde(default)]
    pub offset: Transform3D,
    /// Omitted for links rigidly fixed to their parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint: Option<JointDescription>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub geometry: Vec<Geometry>,
}

impl LinkDescription {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            offset: Transform3D::identity(),
            joint: None,
            geometry: Vec::new(),
        }
    }

    pub fn child(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            ..Self::root(name)
        }
    }

    pub fn with_offset(mut self, offset: Transform3D) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_joint(mut self, joint: JointDescription) -> Self {
        self.joint = Some(joint);
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry.push(geometry);
        self
    }
}

/// Serializable description of one [`Joint`].  Missing limits mean
/// "unlimited".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JointDescription {
    #[serde(rename = "type")]
    pub kind: JointKind,
    #[serde(default = "default_axis")]
    pub axis: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_lower: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_upper: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dq_lower: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dq_upper: Option<f64>,
}

fn default_axis() -> Vec3 {
    Vec3::unit_z()
}

impl JointDescription {
    /// Revolute joint about local z with the given position range.
    pub fn revolute(q_lower: f64, q_upper: f64) -> Self {
        Self {
            kind: JointKind::Revolute,
            axis: default_axis(),
            q_lower: Some(q_lower),
            q_upper: Some(q_upper),
            dq_lower: None,
            dq_upper: None,
        }
    }

    /// Prismatic joint along local z with the given position range.
    pub fn prismatic(q_lower: f64, q_upper: f64) -> Self {
        Self {
            kind: JointKind::Prismatic,
            ..Self::revolute(q_lower, q_upper)
        }
    }

    /// Joint of [`JointKind::Other`] type with no limits.
    pub fn other() -> Self {
        Self {
            kind: JointKind::Other,
            axis: default_axis(),
            q_lower: None,
            q_upper: None,
            dq_lower: None,
            dq_upper: None,
        }
    }

    pub fn with_axis(mut self, axis: Vec3) -> Self {
        self.axis = axis;
        self
    }

    pub fn with_velocity_limits(mut self, dq_lower: f64, dq_upper: f64) -> Self {
        self.dq_lower = Some(dq_lower);
        self.dq_upper = Some(dq_upper);
        self
    }

    fn build(self, id: usize, link_index: usize, name: &str) -> Result<Joint, FaultError> {
        let joint_type = match self.kind {
            JointKind::Revolute | JointKind::Prismatic => {
                let axis = self.axis.normalized().ok_or_else(|| {
                    FaultError::InvalidBody(format!("joint '{name}' has a zero-length axis"))
                })?;
                if self.kind == JointKind::Revolute {
                    JointType::Revolute { axis }
                } else {
                    JointType::Prismatic { axis }
                }
            }
            JointKind::Other => JointType::Other,
        };

        let q_lower = self.q_lower.unwrap_or(f64::NEG_INFINITY);
        let q_upper = self.q_upper.unwrap_or(f64::INFINITY);
        let dq_lower = self.dq_lower.unwrap_or(f64::NEG_INFINITY);
        let dq_upper = self.dq_upper.unwrap_or(f64::INFINITY);

        if q_lower.is_nan() || q_upper.is_nan() || q_lower > q_upper {
            return Err(FaultError::InvalidBody(format!(
                "joint '{name}' has an invalid position range [{q_lower}, {q_upper}]"
            )));
        }
        if dq_lower.is_nan() || dq_upper.is_nan() || dq_lower > dq_upper {
            return Err(FaultError::InvalidBody(format!(
                "joint '{name}' has an invalid velocity range [{dq_lower}, {dq_upper}]"
            )));
        }

        Ok(Joint {
            id,
            link_index,
            name: name.to_string(),
            joint_type,
            q_lower,
            q_upper,
            dq_lower,
            dq_upper,
            q: 0.0,
            dq: 0.0,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
