//! Rigid clusters: synthetic particles standing in for a group of children.
//!
//! A cluster parent is appended to the particle store and carries the aggregated mass
//! properties and a union shape of its children. Children are disabled while clustered
//! and are put back in place when the cluster is released.
//!
//! Children whose bounds touch are recorded as connected when the cluster is created.
//! [`ClusterManager::break_children`] uses that graph to split a cluster: only the
//! over-strained children come loose and the rest regroup by connectivity.

use std::collections::{BTreeMap, BTreeSet};

use glam::{Mat3, Quat, Vec3};

use crate::config::DEFAULT_CLUSTER_CONNECTIVITY_THICKNESS;
use crate::core::{InertiaTensorExt, MassProperties, Particle, ParticleStore, Transform, Velocity};
use crate::dynamics::island::IslandManager;
use crate::error::{KernelError, Result};
use crate::geometry::{Aabb, Shape, ShapeMember};
use crate::utils::math::rotate_inertia;

/// Bookkeeping for one cluster parent.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterInfo {
    pub children: Vec<usize>,
    /// Each child's frame relative to the parent, parallel to `children`.
    pub child_frames: Vec<Transform>,
    /// Parent strain above which the cluster breaks.
    pub break_strain: f32,
    /// Strain each child tolerates in [`ClusterManager::break_children`], parallel to
    /// `children`.
    pub child_break_strains: Vec<f32>,
    /// Touching children as `(low, high)` particle index pairs, ascending.
    pub connectivity: Vec<(usize, usize)>,
}

impl ClusterInfo {
    fn slot_of(&self, child: usize) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }
}

#[derive(Debug)]
pub struct ClusterManager {
    clusters: BTreeMap<usize, ClusterInfo>,
    connectivity_thickness: f32,
}

impl Default for ClusterManager {
    fn default() -> Self {
        Self {
            clusters: BTreeMap::new(),
            connectivity_thickness: DEFAULT_CLUSTER_CONNECTIVITY_THICKNESS,
        }
    }
}

impl ClusterManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects children whose bounds come within `thickness` of each other.
    pub fn with_connectivity_thickness(thickness: f32) -> Self {
        Self {
            connectivity_thickness: thickness.max(0.0),
            ..Self::default()
        }
    }

    pub fn connectivity_thickness(&self) -> f32 {
        self.connectivity_thickness
    }

    /// Groups `children` under a new parent particle and returns its index.
    pub fn create_cluster_particle(
        &mut self,
        particles: &mut ParticleStore,
        children: &[usize],
        break_strain: f32,
    ) -> Result<usize> {
        Self::validate_children(particles, children)?;

        let (parent_transform, velocity, angular_velocity, mass_properties) =
            match children.iter().copied().find(|&c| particles.is_static(c)) {
                Some(anchor) => (
                    particles.transform(anchor),
                    particles.linear_velocities[anchor],
                    particles.angular_velocities[anchor],
                    MassProperties::infinite(),
                ),
                None => Self::aggregate(particles, children),
            };

        let inverse_parent = parent_transform.inverse();
        let child_frames: Vec<Transform> = children
            .iter()
            .map(|&c| inverse_parent.combine(&particles.transform(c)))
            .collect();

        let members: Vec<ShapeMember> = children
            .iter()
            .zip(&child_frames)
            .filter_map(|(&c, frame)| {
                particles
                    .shape(c)
                    .map(|shape| ShapeMember::new(*frame, shape.clone()))
            })
            .collect();

        let mut parent = Particle::new()
            .with_position(parent_transform.position)
            .with_rotation(parent_transform.rotation)
            .with_velocity(velocity)
            .with_angular_velocity(angular_velocity)
            .with_mass_properties(mass_properties);
        if !members.is_empty() {
            parent = parent.with_shape(Shape::union(members).into_shared());
        }
        parent.flags.sleeping = children.iter().all(|&c| particles.flags[c].sleeping);

        let connectivity = Self::build_connectivity(
            particles,
            children,
            &child_frames,
            self.connectivity_thickness,
        );

        let index = particles.add_particle(parent);
        for &child in children {
            particles.flags[child].disabled = true;
            particles.cluster_parents[child] = Some(index);
        }

        log::debug!(
            "created cluster {index} from {} children with {} connections (mass {:.3})",
            children.len(),
            connectivity.len(),
            mass_properties.mass
        );
        self.clusters.insert(
            index,
            ClusterInfo {
                children: children.to_vec(),
                child_frames,
                break_strain,
                child_break_strains: vec![break_strain; children.len()],
                connectivity,
            },
        );
        Ok(index)
    }

    /// Pairs of children whose thickened bounds overlap in the parent frame.
    ///
    /// A child without bounds counts as a point at its own origin.
    fn build_connectivity(
        particles: &ParticleStore,
        children: &[usize],
        child_frames: &[Transform],
        thickness: f32,
    ) -> Vec<(usize, usize)> {
        let bounds: Vec<Aabb> = children
            .iter()
            .zip(child_frames)
            .map(|(&c, frame)| {
                particles
                    .shape(c)
                    .and_then(|shape| shape.bounding_box().ok())
                    .unwrap_or_else(|| Aabb::new(Vec3::ZERO, Vec3::ZERO))
                    .transformed(frame)
                    .thickened(thickness)
            })
            .collect();

        let mut edges = Vec::new();
        for i in 0..children.len() {
            for j in i + 1..children.len() {
                if bounds[i].intersects(&bounds[j]) {
                    let (a, b) = (children[i], children[j]);
                    edges.push((a.min(b), a.max(b)));
                }
            }
        }
        edges.sort_unstable();
        edges
    }

    fn validate_children(particles: &ParticleStore, children: &[usize]) -> Result<()> {
        if children.is_empty() {
            return Err(KernelError::EmptyCluster);
        }
        let len = particles.len();
        let mut seen = BTreeSet::new();
        for &child in children {
            if child >= len {
                return Err(KernelError::ParticleOutOfRange { index: child, len });
            }
            if !seen.insert(child) {
                return Err(KernelError::DuplicateChild { child });
            }
            if let Some(parent) = particles.cluster_parents[child] {
                return Err(KernelError::ChildAlreadyClustered { child, parent });
            }
            if particles.flags[child].disabled {
                return Err(KernelError::DisabledChild { child });
            }
        }
        Ok(())
    }

    /// Center of mass frame, momentum-conserving velocities and summed inertia.
    fn aggregate(
        particles: &ParticleStore,
        children: &[usize],
    ) -> (Transform, Vec3, Vec3, MassProperties) {
        let mut mass = 0.0;
        let mut weighted_position = Vec3::ZERO;
        let mut momentum = Vec3::ZERO;
        for &c in children {
            let m = particles.masses[c];
            mass += m;
            weighted_position += particles.positions[c] * m;
            momentum += particles.linear_velocities[c] * m;
        }
        // Zero total mass implies a static child, which the caller handles.
        let inv_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        let center = weighted_position * inv_mass;

        let mut angular_momentum = Vec3::ZERO;
        let mut inertia = Mat3::ZERO;
        for &c in children {
            let m = particles.masses[c];
            let arm = particles.positions[c] - center;
            angular_momentum +=
                particles.angular_velocities[c] * m + arm.cross(particles.linear_velocities[c] * m);
            inertia += rotate_inertia(particles.rotations[c], particles.inertias[c])
                + Mat3::for_point_mass(arm, m);
        }

        (
            Transform::from_position_rotation(center, Quat::IDENTITY),
            momentum * inv_mass,
            angular_momentum * inv_mass,
            MassProperties { mass, inertia },
        )
    }

    /// Dissolves the cluster rooted at `parent`, returning its children in creation order.
    ///
    /// Children are placed at the parent's current frame composed with their recorded
    /// frame, pick up the parent's rigid velocity at their location and its sleep state.
    /// The parent is disabled.
    pub fn release_cluster_particle(
        &mut self,
        particles: &mut ParticleStore,
        parent: usize,
    ) -> Result<Vec<usize>> {
        let info = self
            .clusters
            .remove(&parent)
            .ok_or(KernelError::NotACluster { index: parent })?;
        Self::place_children(particles, parent, &info);
        log::debug!("released cluster {parent} into {} children", info.children.len());
        Ok(info.children)
    }

    /// Puts every child of `info` back into the simulation and disables `parent`.
    fn place_children(particles: &mut ParticleStore, parent: usize, info: &ClusterInfo) {
        let parent_transform = particles.transform(parent);
        let linear = particles.linear_velocities[parent];
        let angular = particles.angular_velocities[parent];
        let sleeping = particles.flags[parent].sleeping;

        for (&child, frame) in info.children.iter().zip(&info.child_frames) {
            let world = parent_transform.combine(frame);
            let arm = world.position - parent_transform.position;

            particles.set_position(child, world.position);
            particles.rotations[child] = world.rotation;
            particles.predicted_rotations[child] = world.rotation;
            particles.set_velocity(
                child,
                Velocity {
                    linear: linear + angular.cross(arm),
                    angular,
                },
            );
            particles.cluster_parents[child] = None;
            particles.flags[child].disabled = false;
            particles.flags[child].sleeping = sleeping;
        }

        particles.flags[parent].disabled = true;
        particles.strains[parent] = 0.0;
    }

    /// Sets the strain `child` tolerates before [`break_children`](Self::break_children)
    /// pulls it out of `parent`.
    pub fn set_child_break_strain(
        &mut self,
        parent: usize,
        child: usize,
        break_strain: f32,
    ) -> Result<()> {
        let info = self
            .clusters
            .get_mut(&parent)
            .ok_or(KernelError::NotACluster { index: parent })?;
        let slot = info
            .slot_of(child)
            .ok_or(KernelError::NotAChild { child, parent })?;
        info.child_break_strains[slot] = break_strain;
        Ok(())
    }

    /// Breaks off the children of `parent` whose strain in `strain_map` exceeds their
    /// own threshold and regroups the rest.
    ///
    /// Children missing from `strain_map` are unstrained. When no child breaks the
    /// cluster is left untouched and the result is empty. Otherwise the parent is
    /// dissolved as in [`release_cluster_particle`](Self::release_cluster_particle):
    /// broken children stay free, and the remaining children split into connected
    /// groups. A group of one stays free; a larger group becomes a new cluster with the
    /// parent's break strain and the members' own thresholds.
    ///
    /// Returns the broken children in child order, then one entry per remaining group
    /// ordered by its smallest member: the lone child or the new parent.
    pub fn break_children(
        &mut self,
        particles: &mut ParticleStore,
        parent: usize,
        strain_map: &BTreeMap<usize, f32>,
    ) -> Result<Vec<usize>> {
        let info = self
            .clusters
            .get(&parent)
            .ok_or(KernelError::NotACluster { index: parent })?;
        let broken: Vec<usize> = info
            .children
            .iter()
            .zip(&info.child_break_strains)
            .filter(|&(child, &threshold)| {
                strain_map.get(child).is_some_and(|&strain| strain > threshold)
            })
            .map(|(&child, _)| child)
            .collect();
        if broken.is_empty() {
            return Ok(Vec::new());
        }

        let info = self
            .clusters
            .remove(&parent)
            .ok_or(KernelError::NotACluster { index: parent })?;
        Self::place_children(particles, parent, &info);

        let mut remaining: Vec<usize> = info
            .children
            .iter()
            .copied()
            .filter(|child| !broken.contains(child))
            .collect();
        remaining.sort_unstable();

        let mut groups = IslandManager::new();
        groups.build_islands(particles.len(), &remaining, &info.connectivity);

        let mut pieces = broken.clone();
        for group in groups.islands() {
            if let [single] = group.particles[..] {
                pieces.push(single);
                continue;
            }
            let regrouped =
                self.create_cluster_particle(particles, &group.particles, info.break_strain)?;
            if let Some(created) = self.clusters.get_mut(&regrouped) {
                for (slot, &child) in created.children.iter().enumerate() {
                    if let Some(old) = info.slot_of(child) {
                        created.child_break_strains[slot] = info.child_break_strains[old];
                    }
                }
            }
            pieces.push(regrouped);
        }

        log::debug!(
            "cluster {parent} lost {} of {} children and left {} pieces",
            broken.len(),
            info.children.len(),
            pieces.len() - broken.len()
        );
        Ok(pieces)
    }

    /// Releases every enabled cluster whose parent strain exceeds its threshold.
    ///
    /// Clusters are visited in ascending parent order. Returns all released children.
    pub fn break_strained_clusters(&mut self, particles: &mut ParticleStore) -> Vec<usize> {
        let strained: Vec<usize> = self
            .clusters
            .iter()
            .filter(|&(&parent, info)| {
                !particles.flags[parent].disabled && particles.strains[parent] > info.break_strain
            })
            .map(|(&parent, _)| parent)
            .collect();

        let mut released = Vec::new();
        for parent in strained {
            log::debug!(
                "cluster {parent} fractured at strain {:.3}",
                particles.strains[parent]
            );
            if let Ok(children) = self.release_cluster_particle(particles, parent) {
                released.extend(children);
            }
        }
        released
    }

    pub fn children(&self, parent: usize) -> Option<&[usize]> {
        self.clusters.get(&parent).map(|info| info.children.as_slice())
    }

    /// Touching child pairs of `parent`, ascending.
    pub fn connectivity(&self, parent: usize) -> Option<&[(usize, usize)]> {
        self.clusters
            .get(&parent)
            .map(|info| info.connectivity.as_slice())
    }

    pub fn cluster_info(&self, parent: usize) -> Option<&ClusterInfo> {
        self.clusters.get(&parent)
    }

    pub fn is_cluster(&self, index: usize) -> bool {
        self.clusters.contains_key(&index)
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Cluster parents, ascending.
    pub fn parents(&self) -> impl Iterator<Item = usize> + '_ {
        self.clusters.keys().copied()
    }
}
