use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::bootstrap::{
    bind_select_menu, build_page, init_page, Page, SelectionChange, SelectionHandler,
    SelectionOutcome,
};
use crate::config::{self, UIConfig};
use crate::data::{DataSource, HttpDataSource};
use crate::dom::Event;
use crate::model::PostId;
use crate::placeholder;
use crate::surface::{RenderController, Surface};
use crate::toggle::{section_visibility, Visibility};

pub const COMMANDS_HELP: &str = "Commands:\n  select [id]   Show posts for a user (defaults to the configured user)\n  click <id>    Toggle the comments of a post\n  show          Print the rendered posts\n  page          Print the whole document\n  help          Show this message\n  quit          Exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select(Option<String>),
    Click(PostId),
    Show,
    Page,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}, type `help` for a list")]
    Unknown(String),
    #[error("`click` needs a numeric post id")]
    MissingPostId,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(CommandError::Empty);
        };
        let arg = words.next();
        match name.to_ascii_lowercase().as_str() {
            "select" => Ok(Command::Select(arg.map(str::to_string))),
            "click" | "toggle" => arg
                .and_then(|value| value.parse().ok())
                .map(Command::Click)
                .ok_or(CommandError::MissingPostId),
            "show" => Ok(Command::Show),
            "page" => Ok(Command::Page),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// One bootstrapped page wired to a data source.
pub struct App<S: DataSource> {
    source: S,
    controller: RenderController,
    page: Page,
    selection: SelectionHandler,
    changes: UnboundedReceiver<SelectionChange>,
}

impl<S: DataSource> App<S> {
    /// Builds the page, fills the select menu, binds its change events and
    /// mounts the prompt.
    pub async fn start(source: S, ui: &UIConfig) -> Self {
        let surface = Surface::default();
        let page = surface.with(build_page);
        let controller =
            RenderController::new(surface.clone(), page.main, ui.placeholder_text.clone());
        let (sender, changes) = mpsc::unbounded_channel();

        init_page(&source, &surface, &page).await;
        surface.with(|doc| bind_select_menu(doc, page.select, sender));
        controller.refresh(&source, None).await;

        Self {
            source,
            controller,
            page,
            selection: SelectionHandler::new(page.select, ui.fallback_user()),
            changes,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn controller(&self) -> &RenderController {
        &self.controller
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Fires a change event on the select menu. A disabled menu ignores it.
    pub fn select(&self, value: Option<&str>) -> bool {
        let select = self.page.select;
        self.controller.surface().with(|doc| {
            if doc.is_disabled(select) {
                return false;
            }
            if let Some(value) = value {
                doc.set_attr(select, "value", value);
            }
            doc.dispatch(&Event::change(select, value.map(str::to_string))) > 0
        })
    }

    /// Clicks the toggle button of a rendered post.
    pub fn click(&self, post_id: PostId) -> bool {
        self.controller.surface().with(|doc| {
            match doc.query_by_data("button", "postId", &post_id.to_string()) {
                Some(button) => doc.dispatch(&Event::click(button)) > 0,
                None => false,
            }
        })
    }

    /// Runs a full render cycle for every queued selection change.
    pub async fn process_pending(&mut self) -> Vec<SelectionOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(change) = self.changes.try_recv() {
            let outcome = self
                .selection
                .on_select_change(&self.source, &self.controller, &change)
                .await;
            outcomes.push(outcome);
        }
        outcomes
    }

    pub fn rendered_post_count(&self) -> usize {
        let main = self.page.main;
        self.controller.surface().read(|doc| {
            doc.children(main)
                .iter()
                .filter(|node| doc.tag_name(**node) == Some("article"))
                .count()
        })
    }

    pub fn main_html(&self) -> String {
        let main = self.page.main;
        self.controller.surface().read(|doc| doc.outer_html(main))
    }

    pub fn page_html(&self) -> String {
        self.controller
            .surface()
            .read(|doc| doc.outer_html(doc.root()))
    }

    pub async fn execute(&mut self, command: Command) -> Option<String> {
        match command {
            Command::Select(value) => {
                if !self.select(value.as_deref()) {
                    return Some("Selection ignored: the menu is busy.".to_string());
                }
                let outcomes = self.process_pending().await;
                let user = outcomes.last().map(|outcome| outcome.user_id)?;
                let count = self.rendered_post_count();
                let suffix = if count == 1 { "post" } else { "posts" };
                Some(format!("User {user}: {count} {suffix} rendered."))
            }
            Command::Click(post_id) => {
                if !self.click(post_id) {
                    return Some(format!("No comment toggle for post {post_id}."));
                }
                let state = self
                    .controller
                    .surface()
                    .read(|doc| section_visibility(doc, post_id));
                Some(match state {
                    Some(Visibility::Shown) => format!("Post {post_id}: comments shown."),
                    _ => format!("Post {post_id}: comments hidden."),
                })
            }
            Command::Show => Some(self.main_html()),
            Command::Page => Some(self.page_html()),
            Command::Help => Some(COMMANDS_HELP.to_string()),
            Command::Quit => None,
        }
    }
}

pub fn run() -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;

    let client = placeholder::Client::new(placeholder::ClientConfig {
        base_url: Some(cfg.api.base_url.clone()),
        user_agent: cfg.api.user_agent.clone(),
        timeout: Some(cfg.api.timeout),
        http_client: None,
    })
    .context("build placeholder client")?;
    let source = HttpDataSource::new(Arc::new(client));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    runtime.block_on(run_loop(source, cfg.ui))
}

async fn run_loop<S: DataSource>(source: S, ui: UIConfig) -> Result<()> {
    let mut app = App::start(source, &ui).await;
    info!("page ready");
    println!("{COMMANDS_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("read command")? {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(command) => {
                if let Some(output) = app.execute(command).await {
                    println!("{output}");
                }
            }
            Err(err) => eprintln!("{err}"),
        }
    }
    Ok(())
}
