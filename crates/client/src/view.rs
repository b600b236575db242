//! Local mirror of the pieces of server state the engine itself needs.
//!
//! This is a best-effort visual cache, not a rules engine: speculative
//! updates mutate it before confirmation, and every authoritative
//! `UpdateGameView` overwrites whatever it carries.

use riftfall_protocol::{GameView, PanelAddress, PlayerSide, PlayerView};

/// Client-side snapshot of the local player's visible counters plus the set
/// of currently open panels.
#[derive(Debug, Clone)]
pub struct LocalView {
    side: PlayerSide,
    mana: u32,
    action_points: u32,
    open_panels: Vec<PanelAddress>,
}

impl LocalView {
    /// Create an empty view for the given side.
    pub fn new(side: PlayerSide) -> Self {
        Self {
            side,
            mana: 0,
            action_points: 0,
            open_panels: Vec::new(),
        }
    }

    /// Side the local player occupies.
    pub fn side(&self) -> PlayerSide {
        self.side
    }

    /// Currently visible mana.
    pub fn mana(&self) -> u32 {
        self.mana
    }

    /// Currently visible action points.
    pub fn action_points(&self) -> u32 {
        self.action_points
    }

    /// Merge an authoritative view update. Absent fields leave state alone.
    pub fn apply(&mut self, view: &GameView) {
        if let Some(user) = &view.user {
            if let Some(mana) = user.mana {
                self.mana = mana;
            }
            if let Some(points) = user.action_points {
                self.action_points = points;
            }
        }
    }

    /// Speculatively spend one action point.
    ///
    /// Returns the partial view update that renders the decrement; the next
    /// authoritative update supersedes it.
    pub fn spend_action_point(&mut self) -> GameView {
        self.action_points = self.action_points.saturating_sub(1);
        GameView {
            user: Some(PlayerView {
                side: self.side,
                mana: None,
                action_points: Some(self.action_points),
                avatar: None,
            }),
            ..GameView::default()
        }
    }

    /// Record a panel opening or closing.
    pub fn set_panel_open(&mut self, panel: &PanelAddress, open: bool) {
        if open {
            if !self.open_panels.contains(panel) {
                self.open_panels.push(panel.clone());
            }
        } else {
            self.open_panels.retain(|p| p != panel);
        }
    }

    /// Snapshot of the open panel addresses, in opening order.
    pub fn open_panels(&self) -> Vec<PanelAddress> {
        self.open_panels.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_merges_present_fields_only() {
        let mut view = LocalView::new(PlayerSide::Riftborn);
        view.apply(&GameView {
            user: Some(PlayerView {
                side: PlayerSide::Riftborn,
                mana: Some(5),
                action_points: Some(3),
                avatar: None,
            }),
            ..GameView::default()
        });
        assert_eq!(view.mana(), 5);
        assert_eq!(view.action_points(), 3);

        // Partial update: only mana present.
        view.apply(&GameView {
            user: Some(PlayerView {
                side: PlayerSide::Riftborn,
                mana: Some(2),
                action_points: None,
                avatar: None,
            }),
            ..GameView::default()
        });
        assert_eq!(view.mana(), 2);
        assert_eq!(view.action_points(), 3);
    }

    #[test]
    fn speculative_spend_decrements_and_saturates() {
        let mut view = LocalView::new(PlayerSide::Riftborn);
        view.apply(&GameView {
            user: Some(PlayerView {
                side: PlayerSide::Riftborn,
                mana: None,
                action_points: Some(1),
                avatar: None,
            }),
            ..GameView::default()
        });

        let update = view.spend_action_point();
        assert_eq!(view.action_points(), 0);
        assert_eq!(
            update.user.expect("user view").action_points,
            Some(0)
        );

        view.spend_action_point();
        assert_eq!(view.action_points(), 0);
    }

    #[test]
    fn panel_set_tracks_open_order_without_duplicates() {
        let mut view = LocalView::new(PlayerSide::Covenant);
        let a = PanelAddress::new("menu/a");
        let b = PanelAddress::new("menu/b");

        view.set_panel_open(&a, true);
        view.set_panel_open(&b, true);
        view.set_panel_open(&a, true);
        assert_eq!(view.open_panels(), vec![a.clone(), b.clone()]);

        view.set_panel_open(&a, false);
        assert_eq!(view.open_panels(), vec![b]);
    }
}
