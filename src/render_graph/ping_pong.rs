//! Ping-pong state machine driving the separable bloom blur.
//!
//! The blur runs a single shader `N` times, alternating horizontal and
//! vertical direction. Two same-sized buffers trade the source and
//! destination roles every iteration so no pass reads the texture it writes:
//!
//! ```text
//! step 0: Bright ──h──▶ A
//! step 1:   A    ──v──▶ B
//! step 2:   B    ──h──▶ A
//! ...
//! ```
//!
//! The first step samples the HDR target's bright attachment because no
//! ping-pong output exists yet.

/// One of the two ping-pong buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PingPongSlot {
    A,
    B,
}

impl PingPongSlot {
    /// The other buffer of the pair.
    pub fn other(self) -> Self {
        match self {
            PingPongSlot::A => PingPongSlot::B,
            PingPongSlot::B => PingPongSlot::A,
        }
    }
}

/// Where a blur step reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlurSource {
    /// The HDR target's bright-pass attachment (first step only).
    Bright,
    /// Output of the previous step.
    PingPong(PingPongSlot),
}

/// A single blur pass to execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlurStep {
    pub iteration: u32,
    pub horizontal: bool,
    pub source: BlurSource,
    pub destination: PingPongSlot,
}

/// Current role assignment of the blur buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PingPong {
    iteration: u32,
    horizontal: bool,
    source: BlurSource,
    destination: PingPongSlot,
    last_written: Option<PingPongSlot>,
}

impl Default for PingPong {
    fn default() -> Self {
        Self::new()
    }
}

impl PingPong {
    /// Initial state: horizontal, reading the bright pass, writing `A`.
    pub fn new() -> Self {
        Self {
            iteration: 0,
            horizontal: true,
            source: BlurSource::Bright,
            destination: PingPongSlot::A,
            last_written: None,
        }
    }

    /// Emit the pass for the current state, then advance: flip direction
    /// and make the buffer just written the next source.
    pub fn step(&mut self) -> BlurStep {
        let step = BlurStep {
            iteration: self.iteration,
            horizontal: self.horizontal,
            source: self.source,
            destination: self.destination,
        };

        self.last_written = Some(self.destination);
        self.source = BlurSource::PingPong(self.destination);
        self.destination = self.destination.other();
        self.horizontal = !self.horizontal;
        self.iteration += 1;

        step
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn horizontal(&self) -> bool {
        self.horizontal
    }

    pub fn source(&self) -> BlurSource {
        self.source
    }

    pub fn destination(&self) -> PingPongSlot {
        self.destination
    }

    /// Buffer holding the blurred result, or `None` if no step has run.
    pub fn result(&self) -> Option<PingPongSlot> {
        self.last_written
    }
}

/// Unroll `iterations` blur steps. Returns the steps in execution order and
/// the buffer holding the final result (`None` when `iterations == 0`).
pub fn blur_steps(iterations: u32) -> (Vec<BlurStep>, Option<PingPongSlot>) {
    let mut state = PingPong::new();
    let steps = (0..iterations).map(|_| state.step()).collect();
    (steps, state.result())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state() {
        let state = PingPong::new();
        assert!(state.horizontal());
        assert_eq!(state.source(), BlurSource::Bright);
        assert_eq!(state.destination(), PingPongSlot::A);
        assert_eq!(state.result(), None);
    }

    #[test]
    fn step_swaps_roles_and_flips_direction() {
        let mut state = PingPong::new();

        let first = state.step();
        assert_eq!(first.source, BlurSource::Bright);
        assert_eq!(first.destination, PingPongSlot::A);
        assert!(first.horizontal);

        let second = state.step();
        assert_eq!(second.source, BlurSource::PingPong(PingPongSlot::A));
        assert_eq!(second.destination, PingPongSlot::B);
        assert!(!second.horizontal);

        let third = state.step();
        assert_eq!(third.source, BlurSource::PingPong(PingPongSlot::B));
        assert_eq!(third.destination, PingPongSlot::A);
        assert!(third.horizontal);
    }

    #[test]
    fn only_first_step_reads_bright_pass() {
        let (steps, _) = blur_steps(10);
        assert_eq!(steps.len(), 10);
        assert_eq!(steps[0].source, BlurSource::Bright);
        assert!(
            steps[1..]
                .iter()
                .all(|s| matches!(s.source, BlurSource::PingPong(_)))
        );
    }

    #[test]
    fn no_step_reads_its_own_destination() {
        let (steps, _) = blur_steps(7);
        for step in steps {
            assert_ne!(step.source, BlurSource::PingPong(step.destination));
        }
    }

    #[test]
    fn even_iterations_end_in_buffer_b() {
        for n in [2, 4, 10, 32] {
            let (steps, result) = blur_steps(n);
            assert_eq!(result, Some(PingPongSlot::B), "n = {}", n);
            assert_eq!(steps.last().map(|s| s.destination), result);
        }
    }

    #[test]
    fn odd_iterations_end_in_buffer_a() {
        for n in [1, 3, 9] {
            let (_, result) = blur_steps(n);
            assert_eq!(result, Some(PingPongSlot::A), "n = {}", n);
        }
    }

    #[test]
    fn even_iterations_restore_initial_roles() {
        let mut state = PingPong::new();
        for _ in 0..4 {
            state.step();
        }
        assert!(state.horizontal());
        assert_eq!(state.destination(), PingPongSlot::A);
        assert_eq!(state.iteration(), 4);
    }

    #[test]
    fn zero_iterations_have_no_result() {
        let (steps, result) = blur_steps(0);
        assert!(steps.is_empty());
        assert_eq!(result, None);
    }
}
