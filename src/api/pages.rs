use minijinja::{context, Environment};
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

use crate::content::Article;
use crate::error::{ContentError, Result};
use crate::storage::ArticleSummary;

/// Form state shared by every page.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub topic: String,
    pub temperature: f32,
    pub error: Option<String>,
}

/// HTML pages rendered from the embedded templates.
pub struct PageRenderer {
    env: Environment<'static>,
    search_enabled: bool,
    env_key: bool,
}

impl PageRenderer {
    pub fn new(search_enabled: bool, env_key: bool) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("layout.html", include_str!("../static/layout.html"))
            .map_err(ContentError::from)?;
        env.add_template("index.html", include_str!("../static/index.html"))
            .map_err(ContentError::from)?;
        env.add_template("article.html", include_str!("../static/article.html"))
            .map_err(ContentError::from)?;

        Ok(Self {
            env,
            search_enabled,
            env_key,
        })
    }

    pub fn index(&self, form: &FormState, recent: &[ArticleSummary]) -> Result<String> {
        let template = self.env.get_template("index.html").map_err(ContentError::from)?;
        let page = template
            .render(context! {
                topic => &form.topic,
                temperature => format!("{:.2}", form.temperature),
                error => &form.error,
                recent => recent,
                search_enabled => self.search_enabled,
                env_key => self.env_key,
            })
            .map_err(ContentError::from)?;
        Ok(page)
    }

    pub fn article(&self, article: &Article) -> Result<String> {
        let template = self.env.get_template("article.html").map_err(ContentError::from)?;
        let page = template
            .render(context! {
                article => article,
                body => render_markdown(&article.markdown),
                research => render_markdown(&article.research),
                topic => &article.topic,
                temperature => format!("{:.2}", article.temperature),
                search_enabled => self.search_enabled,
                env_key => self.env_key,
            })
            .map_err(ContentError::from)?;
        Ok(page)
    }
}

fn is_unsafe_url(url: &str) -> bool {
    let lowered = url.trim().to_ascii_lowercase();
    lowered.starts_with("javascript:") || lowered.starts_with("vbscript:") || lowered.starts_with("data:")
}

/// Markdown to HTML with raw HTML shown as text and script-like links disabled.
pub fn render_markdown(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_TASKLISTS;

    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link { link_type, dest_url, title, id }) if is_unsafe_url(&dest_url) => {
            Event::Start(Tag::Link {
                link_type,
                dest_url: CowStr::Borrowed("#"),
                title,
                id,
            })
        }
        other => other,
    });

    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, events);
    output
}
