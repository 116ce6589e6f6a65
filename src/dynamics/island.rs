use crate::core::ParticleStore;

/// A connected set of active particles that can be solved independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Island {
    /// Member indices, ascending.
    pub particles: Vec<usize>,
}

impl Island {
    pub fn contains(&self, index: usize) -> bool {
        self.particles.binary_search(&index).is_ok()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}

/// Builds islands each step and manages sleeping state.
#[derive(Debug, Default)]
pub struct IslandManager {
    islands: Vec<Island>,
    island_of: Vec<Option<usize>>,
    adjacency: Vec<Vec<usize>>,
}

impl IslandManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partitions `active` into connected components of `edges`.
    ///
    /// `active` must be ascending. Edges touching an inactive or out-of-range particle are
    /// ignored. Islands come out ordered by their smallest member.
    pub fn build_islands(
        &mut self,
        particle_count: usize,
        active: &[usize],
        edges: &[(usize, usize)],
    ) {
        debug_assert!(active.windows(2).all(|w| w[0] < w[1]), "active set must be ascending");

        self.islands.clear();
        self.island_of.clear();
        self.island_of.resize(particle_count, None);
        self.adjacency.iter_mut().for_each(Vec::clear);
        self.adjacency.resize_with(particle_count, Vec::new);

        let mut is_active = vec![false; particle_count];
        for &index in active {
            is_active[index] = true;
        }

        for &(a, b) in edges {
            if a == b || a >= particle_count || b >= particle_count {
                continue;
            }
            if !is_active[a] || !is_active[b] {
                continue;
            }
            self.adjacency[a].push(b);
            self.adjacency[b].push(a);
        }

        let mut visited = vec![false; particle_count];
        for &start in active {
            if visited[start] {
                continue;
            }
            let mut members = self.depth_first_collect(start, &mut visited);
            members.sort_unstable();

            let island_index = self.islands.len();
            for &member in &members {
                self.island_of[member] = Some(island_index);
            }
            self.islands.push(Island { particles: members });
        }

        debug_assert_eq!(
            self.islands.iter().map(Island::len).sum::<usize>(),
            active.len(),
            "islands must partition the active set"
        );
        log::trace!("built {} islands from {} active particles", self.islands.len(), active.len());
    }

    fn depth_first_collect(&self, start: usize, visited: &mut [bool]) -> Vec<usize> {
        let mut stack = vec![start];
        let mut result = Vec::new();

        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            result.push(node);
            stack.extend(self.adjacency[node].iter().copied().filter(|&n| !visited[n]));
        }

        result
    }

    /// Puts every island whose members are all slower than `threshold` to sleep.
    ///
    /// `threshold` compares against `|v|² + |w|²`. Returns the number of islands put to
    /// sleep.
    pub fn update_sleeping(&self, particles: &mut ParticleStore, threshold: f32) -> usize {
        let mut slept = 0;
        for island in &self.islands {
            let quiet = island.particles.iter().all(|&index| {
                particles.linear_velocities[index].length_squared()
                    + particles.angular_velocities[index].length_squared()
                    < threshold
            });
            if !quiet {
                continue;
            }
            for &index in &island.particles {
                particles.flags[index].sleeping = true;
            }
            slept += 1;
        }
        slept
    }

    pub fn islands(&self) -> &[Island] {
        &self.islands
    }

    /// Island containing `index` after the last build, if it was active.
    pub fn island_of(&self, index: usize) -> Option<usize> {
        self.island_of.get(index).copied().flatten()
    }
}
