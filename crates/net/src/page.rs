//! HTML pages served to browsers

use askama::Template;
use keynes_core::{HubId, TargetRatio};

use crate::error::Result;
use crate::invite::InviteUrl;

/// Landing page with "create" and "join" controls
#[derive(Template)]
#[template(path = "home.html")]
pub struct HomePage {
    pub numerator: u32,
    pub denominator: u32,
}

/// Asks for a display name before entering a hub
#[derive(Template)]
#[template(path = "join.html")]
pub struct JoinPage {
    pub hub: String,
}

/// The game itself; the script reads `data-hubhash` and `data-name`
#[derive(Template)]
#[template(path = "game.html")]
pub struct GamePage {
    pub hub: String,
    pub name: String,
    pub invite: String,
}

pub fn render_home(ratio: TargetRatio) -> Result<String> {
    let page = HomePage {
        numerator: ratio.numerator,
        denominator: ratio.denominator,
    };
    Ok(page.render()?)
}

pub fn render_join(hub: &HubId) -> Result<String> {
    let page = JoinPage {
        hub: hub.to_string(),
    };
    Ok(page.render()?)
}

pub fn render_game(invite: &InviteUrl, name: &str) -> Result<String> {
    let page = GamePage {
        hub: invite.hub.to_string(),
        name: name.to_string(),
        invite: invite.to_url(),
    };
    Ok(page.render()?)
}
