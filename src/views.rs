use axum::{http::StatusCode, response::Html};
use serde::Serialize;
use tera::{Context, Tera};

use crate::{
    flash::Flash,
    models::{Collection, Document, Subject, format_timestamp},
};

/// A document as a template sees it. `url` is withheld for private documents
/// on public pages; `access_key` only appears on the admin page.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub description: String,
    pub category: &'static str,
    pub created_at: String,
    pub access_key: Option<String>,
}

impl DocumentView {
    fn base(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            url: None,
            description: doc.description.clone(),
            category: doc.category.label(),
            created_at: format_timestamp(&doc.created_at),
            access_key: None,
        }
    }

    pub fn open(doc: &Document) -> Self {
        Self { url: Some(doc.url.clone()), ..Self::base(doc) }
    }

    pub fn locked(doc: &Document) -> Self {
        Self::base(doc)
    }

    pub fn admin(doc: &Document) -> Self {
        Self {
            url: Some(doc.url.clone()),
            access_key: doc.access_key.clone(),
            ..Self::base(doc)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IndexPage {
    pub public_docs: Vec<DocumentView>,
    pub private_docs: Vec<DocumentView>,
    pub subjects: Vec<&'static str>,
    pub current_subject: Option<String>,
    pub is_admin: bool,
    pub flash: Option<Flash>,
}

impl IndexPage {
    pub fn new(collection: &Collection, current_subject: Option<String>, is_admin: bool, flash: Option<Flash>) -> Self {
        Self {
            public_docs: collection.public.iter().map(DocumentView::open).collect(),
            private_docs: collection.private.iter().map(DocumentView::locked).collect(),
            subjects: Subject::labels(),
            current_subject,
            is_admin,
            flash,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminPage {
    pub public_docs: Vec<DocumentView>,
    pub private_docs: Vec<DocumentView>,
    pub subjects: Vec<&'static str>,
    pub flash: Option<Flash>,
}

impl AdminPage {
    pub fn new(collection: &Collection, flash: Option<Flash>) -> Self {
        Self {
            public_docs: collection.public.iter().map(DocumentView::admin).collect(),
            private_docs: collection.private.iter().map(DocumentView::admin).collect(),
            subjects: Subject::labels(),
            flash,
        }
    }
}

/// Views
///
/// Tera templates compiled into the binary. Names end in `.html`, so
/// autoescaping is on for every variable.
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("base.html", include_str!("../templates/base.html")),
            ("index.html", include_str!("../templates/index.html")),
            ("admin.html", include_str!("../templates/admin.html")),
        ])?;
        Ok(Self { tera })
    }

    pub fn index(&self, page: &IndexPage) -> Result<Html<String>, StatusCode> {
        self.render("index.html", page)
    }

    pub fn admin(&self, page: &AdminPage) -> Result<Html<String>, StatusCode> {
        self.render("admin.html", page)
    }

    fn render(&self, template: &str, page: &impl Serialize) -> Result<Html<String>, StatusCode> {
        let context = Context::from_serialize(page).map_err(|e| {
            tracing::error!(template, "template context error: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

        self.tera.render(template, &context).map(Html).map_err(|e| {
            tracing::error!(template, "template render error: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }
}
