//! Asset collection pass run before a command list executes.

use riftfall_protocol::{
    AssetAddress, CommandList, GameCommand, GameView, PanelNode, StandardAction,
};
use std::collections::BTreeSet;

/// Collect every asset address a command list references, exactly once.
///
/// Walks nested structures: conditional branches, card views, world-map
/// tiles, panel node trees and the speculative updates embedded in panel
/// click handlers. Empty addresses are dropped.
pub fn collect_assets(list: &CommandList) -> BTreeSet<AssetAddress> {
    let mut assets = BTreeSet::new();
    collect_list(list, &mut assets);
    assets.retain(|address| !address.is_empty());
    assets
}

fn collect_list(list: &CommandList, assets: &mut BTreeSet<AssetAddress>) {
    for command in &list.commands {
        collect_command(command, assets);
    }
}

fn collect_command(command: &GameCommand, assets: &mut BTreeSet<AssetAddress>) {
    match command {
        GameCommand::UpdateGameView { view, .. } => collect_view(view, assets),
        GameCommand::PlaySound { address } => {
            assets.insert(address.clone());
        }
        GameCommand::PlayEffect(effect) => {
            assets.insert(effect.address.clone());
            if let Some(sound) = &effect.sound {
                assets.insert(sound.clone());
            }
        }
        GameCommand::FireProjectile(projectile) => {
            assets.insert(projectile.address.clone());
            if let Some(sound) = &projectile.impact_sound {
                assets.insert(sound.clone());
            }
        }
        GameCommand::UpdatePanels { panels } => {
            for panel in panels {
                collect_node(&panel.root, assets);
            }
        }
        GameCommand::Conditional {
            when_true,
            when_false,
            ..
        } => {
            collect_list(when_true, assets);
            collect_list(when_false, assets);
        }
        GameCommand::MoveGameObjects { .. }
        | GameCommand::DisplayMessage { .. }
        | GameCommand::LoadScene { .. }
        | GameCommand::TogglePanel { .. }
        | GameCommand::Delay { .. }
        | GameCommand::Debug(_) => {}
    }
}

fn collect_view(view: &GameView, assets: &mut BTreeSet<AssetAddress>) {
    for player in [&view.user, &view.opponent].into_iter().flatten() {
        if let Some(avatar) = &player.avatar {
            assets.insert(avatar.clone());
        }
    }
    for card in &view.cards {
        if let Some(image) = &card.image {
            assets.insert(image.clone());
        }
        if let Some(frame) = &card.frame {
            assets.insert(frame.clone());
        }
    }
    for tile in &view.world_map {
        assets.insert(tile.sprite.clone());
    }
}

fn collect_node(node: &PanelNode, assets: &mut BTreeSet<AssetAddress>) {
    if let Some(image) = &node.image {
        assets.insert(image.clone());
    }
    if let Some(StandardAction {
        update: Some(update),
        ..
    }) = &node.on_click
    {
        collect_list(update, assets);
    }
    for child in &node.children {
        collect_node(child, assets);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riftfall_protocol::{
        CardIdentifier, CardView, CommandMetadata, ConditionQuery, EffectView, GameObjectId,
        InterfacePanel, MapTileView, PanelAddress, PlayerSide,
    };

    fn card(index: u32, image: &str) -> CardView {
        CardView {
            id: CardIdentifier {
                side: PlayerSide::Riftborn,
                index,
            },
            image: Some(AssetAddress::new(image)),
            frame: Some(AssetAddress::new("sprites/frame")),
            title: None,
            cost: None,
        }
    }

    #[test]
    fn walks_views_panels_and_conditionals() {
        let inner = CommandList::single(GameCommand::PlaySound {
            address: AssetAddress::new("audio/inner"),
        });
        let list = CommandList {
            commands: vec![
                GameCommand::UpdateGameView {
                    view: GameView {
                        cards: vec![card(1, "sprites/a"), card(2, "sprites/b")],
                        world_map: vec![MapTileView {
                            x: 0,
                            y: 0,
                            sprite: AssetAddress::new("tiles/grass"),
                        }],
                        ..GameView::default()
                    },
                    animate: true,
                },
                GameCommand::UpdatePanels {
                    panels: vec![InterfacePanel {
                        address: PanelAddress::new("menu/main"),
                        root: PanelNode {
                            image: Some(AssetAddress::new("sprites/panel_bg")),
                            children: vec![PanelNode {
                                on_click: Some(StandardAction {
                                    payload: vec![1],
                                    update: Some(inner.clone()),
                                }),
                                ..PanelNode::default()
                            }],
                            ..PanelNode::default()
                        },
                    }],
                },
                GameCommand::Conditional {
                    query: ConditionQuery::ElementExists {
                        id: "close".to_string(),
                    },
                    when_true: CommandList::single(GameCommand::PlayEffect(EffectView {
                        address: AssetAddress::new("effects/burst"),
                        owner: GameObjectId::Avatar(PlayerSide::Riftborn),
                        duration_ms: 100,
                        sound: Some(AssetAddress::new("audio/burst")),
                    })),
                    when_false: CommandList::default(),
                },
            ],
            metadata: CommandMetadata::default(),
        };

        let assets = collect_assets(&list);
        let expected: BTreeSet<_> = [
            "sprites/a",
            "sprites/b",
            "sprites/frame",
            "tiles/grass",
            "sprites/panel_bg",
            "audio/inner",
            "effects/burst",
            "audio/burst",
        ]
        .into_iter()
        .map(AssetAddress::new)
        .collect();
        assert_eq!(assets, expected);
    }

    #[test]
    fn duplicates_collected_once() {
        let list = CommandList {
            commands: vec![
                GameCommand::PlaySound {
                    address: AssetAddress::new("audio/click"),
                },
                GameCommand::PlaySound {
                    address: AssetAddress::new("audio/click"),
                },
            ],
            metadata: CommandMetadata::default(),
        };
        assert_eq!(collect_assets(&list).len(), 1);
    }

    #[test]
    fn empty_addresses_dropped() {
        let list = CommandList::single(GameCommand::PlaySound {
            address: AssetAddress::new(""),
        });
        assert!(collect_assets(&list).is_empty());
    }
}
