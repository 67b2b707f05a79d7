use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, macros::format_description};

use crate::application::error::ErrorReport;
use crate::application::pagination::Page;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::forms::FieldErrors;

/// Page links shown on each side of the current page.
const PAGINATOR_SPREAD: u64 = 3;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }

    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let report = ErrorReport::from_error(self.source, status, &self.error);
        let mut response = (status, self.public_message).into_response();
        report.attach(&mut response);
        response
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, TemplateRenderError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Error page without viewer-specific navigation.
pub fn render_error_page(status: StatusCode, message: &str) -> Response {
    let layout = LayoutView::anonymous(message);
    if status == StatusCode::NOT_FOUND {
        return render_template_response(NotFoundTemplate { layout }, status);
    }
    render_template_response(
        ErrorTemplate {
            layout,
            status: status.as_u16(),
            message: message.to_string(),
        },
        status,
    )
}

/// The custom 404 page, with the viewer's navigation.
pub fn render_not_found_response(layout: LayoutView, detail: impl Into<String>) -> Response {
    let mut response = render_template_response(NotFoundTemplate { layout }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        detail,
    )
    .attach(&mut response);
    response
}

pub fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(format_description!(
            "[day] [month repr:short] [year] [hour]:[minute]"
        ))
        .unwrap_or_else(|_| value.to_string())
}

#[derive(Clone, Debug)]
pub struct ViewerView {
    pub username: String,
    pub display_name: String,
}

/// Shared chrome: document title and navigation state.
#[derive(Clone, Debug)]
pub struct LayoutView {
    pub title: String,
    pub viewer: Option<ViewerView>,
}

impl LayoutView {
    pub fn new(title: impl Into<String>, viewer: Option<&UserRecord>) -> Self {
        Self {
            title: title.into(),
            viewer: viewer.map(|user| ViewerView {
                username: user.username.clone(),
                display_name: user.display_name().to_string(),
            }),
        }
    }

    pub fn anonymous(title: impl Into<String>) -> Self {
        Self::new(title, None)
    }
}

#[derive(Clone, Debug)]
pub struct GroupLinkView {
    pub slug: String,
    pub title: String,
}

#[derive(Clone, Debug)]
pub struct PostCardView {
    pub id: i64,
    pub text: String,
    pub pub_date: String,
    pub author_username: String,
    pub author_name: String,
    pub group: Option<GroupLinkView>,
    pub image_url: Option<String>,
}

impl From<&PostRecord> for PostCardView {
    fn from(post: &PostRecord) -> Self {
        Self {
            id: post.id,
            text: post.text.clone(),
            pub_date: format_timestamp(post.pub_date),
            author_username: post.author.username.clone(),
            author_name: post.author.display_name().to_string(),
            group: post.group.as_ref().map(|group| GroupLinkView {
                slug: group.slug.clone(),
                title: group.title.clone(),
            }),
            image_url: post.image.as_deref().map(media_url),
        }
    }
}

pub fn media_url(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

#[derive(Clone, Debug)]
pub struct PaginatorView {
    pub number: u64,
    pub num_pages: u64,
    pub previous: Option<u64>,
    pub next: Option<u64>,
    pub pages: Vec<PageLinkView>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLinkView {
    pub number: u64,
    pub current: bool,
}

impl PaginatorView {
    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }
}

/// Cards plus paginator for any page of posts.
pub fn post_list(page: &Page<PostRecord>) -> (Vec<PostCardView>, PaginatorView) {
    let cards = page.items.iter().map(PostCardView::from).collect();
    let first = page.number.saturating_sub(PAGINATOR_SPREAD).max(1);
    let last = (page.number + PAGINATOR_SPREAD).min(page.num_pages);
    let paginator = PaginatorView {
        number: page.number,
        num_pages: page.num_pages,
        previous: page.previous_page_number(),
        next: page.next_page_number(),
        pages: (first..=last)
            .map(|number| PageLinkView {
                number,
                current: number == page.number,
            })
            .collect(),
    };
    (cards, paginator)
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub layout: LayoutView,
    pub posts: Vec<PostCardView>,
    pub paginator: PaginatorView,
}

#[derive(Clone, Debug)]
pub struct GroupView {
    pub slug: String,
    pub title: String,
    pub description: String,
}

impl From<&GroupRecord> for GroupView {
    fn from(group: &GroupRecord) -> Self {
        Self {
            slug: group.slug.clone(),
            title: group.title.clone(),
            description: group.description.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate {
    pub layout: LayoutView,
    pub group: GroupView,
    pub posts: Vec<PostCardView>,
    pub paginator: PaginatorView,
}

#[derive(Clone, Debug)]
pub struct AuthorView {
    pub username: String,
    pub display_name: String,
    pub post_count: u64,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub layout: LayoutView,
    pub author: AuthorView,
    /// Signed in and looking at somebody else's profile.
    pub can_follow: bool,
    pub following: bool,
    pub posts: Vec<PostCardView>,
    pub paginator: PaginatorView,
}

#[derive(Clone, Debug)]
pub struct CommentView {
    pub author_username: String,
    pub author_name: String,
    pub text: String,
    pub created: String,
}

impl From<&CommentRecord> for CommentView {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            author_username: comment.author.username.clone(),
            author_name: comment.author.display_name().to_string(),
            text: comment.text.clone(),
            created: format_timestamp(comment.created),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PostDetailView {
    pub card: PostCardView,
    pub title_text: String,
    pub author_post_count: u64,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub layout: LayoutView,
    pub post: PostDetailView,
    pub can_edit: bool,
    pub can_comment: bool,
    pub comments: Vec<CommentView>,
}

#[derive(Clone, Debug)]
pub struct GroupOptionView {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

/// Field errors plus a lookup the templates can call.
#[derive(Clone, Debug, Default)]
pub struct FormErrorsView(pub FieldErrors);

impl FormErrorsView {
    pub fn for_field(&self, field: &str) -> &[String] {
        self.0.for_field(field)
    }

    pub fn any(&self) -> bool {
        !self.0.is_empty()
    }
}

#[derive(Template)]
#[template(path = "posts/post_create.html")]
pub struct PostFormTemplate {
    pub layout: LayoutView,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOptionView>,
    pub current_image: Option<String>,
    pub errors: FormErrorsView,
}

impl PostFormTemplate {
    pub fn group_options(groups: &[GroupRecord], selected: Option<i64>) -> Vec<GroupOptionView> {
        groups
            .iter()
            .map(|group| GroupOptionView {
                id: group.id,
                title: group.title.clone(),
                selected: Some(group.id) == selected,
            })
            .collect()
    }

    pub fn none_selected(&self) -> bool {
        !self.groups.iter().any(|group| group.selected)
    }
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub layout: LayoutView,
    pub posts: Vec<PostCardView>,
    pub paginator: PaginatorView,
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: LayoutView,
    pub username: String,
    pub next: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub layout: LayoutView,
    pub username: String,
    pub full_name: String,
    pub errors: FormErrorsView,
}

#[derive(Template)]
#[template(path = "auth/logged_out.html")]
pub struct LoggedOutTemplate {
    pub layout: LayoutView,
}

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AboutAuthorTemplate {
    pub layout: LayoutView,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct AboutTechTemplate {
    pub layout: LayoutView,
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub layout: LayoutView,
}

#[derive(Template)]
#[template(path = "core/error.html")]
pub struct ErrorTemplate {
    pub layout: LayoutView,
    pub status: u16,
    pub message: String,
}
