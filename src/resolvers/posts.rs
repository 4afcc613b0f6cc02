//! Post fields, queries, mutations and live subscriptions.

use super::{Context, Feed};
use crate::error::{FeedError, Result};
use crate::filter::Filter;
use crate::pagination::{Connection, PaginationArgs};
use crate::source::{DataSource, ScanRequest, WriteSource};
use crate::subscriptions::{NewPostFilter, ReplyFilter, SubscriptionHandle, Topic};
use crate::types::{Account, Like, NewPost, Post, PostId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// The account that wrote `post`.
pub fn author<PS, AS, LS>(feed: &Feed<PS, AS, LS>, post: &Post) -> Result<Account>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    feed.accounts()
        .get(post.user_id)?
        .ok_or_else(|| FeedError::NotFound(format!("account {}", post.user_id)))
}

/// The post `post` replies to; `None` for top-level posts or a deleted parent.
pub fn reply_post<PS, AS, LS>(feed: &Feed<PS, AS, LS>, post: &Post) -> Result<Option<Post>>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    match post.reply_to {
        Some(parent) => feed.posts().get(parent),
        None => Ok(None),
    }
}

/// Paginated replies to `post`.
pub fn replies<PS, AS, LS>(
    feed: &Feed<PS, AS, LS>,
    post: &Post,
    args: &PaginationArgs,
) -> Result<Connection<Post>>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    thread(feed, args, post.id)
}

pub fn likes_count<PS, AS, LS>(feed: &Feed<PS, AS, LS>, post: &Post) -> Result<u64>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    feed.likes().count(&Filter::all().eq("post_id", post.id))
}

pub fn replies_count<PS, AS, LS>(feed: &Feed<PS, AS, LS>, post: &Post) -> Result<u64>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    feed.posts().count(&Filter::all().eq("reply_to", post.id))
}

/// Accounts that liked `post`, in the order they liked it.
///
/// Likes whose account no longer exists are skipped.
pub fn people_who_liked<PS, AS, LS>(feed: &Feed<PS, AS, LS>, post: &Post) -> Result<Vec<Account>>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    let filter = Filter::all().eq("post_id", post.id);
    let likes = feed.likes().scan(&ScanRequest::new(&filter, usize::MAX))?;

    let mut accounts = Vec::with_capacity(likes.len());
    for like in likes {
        if let Some(account) = feed.accounts().get(like.user_id)? {
            accounts.push(account);
        }
    }
    Ok(accounts)
}

/// Whether the caller liked `post`. Always false for anonymous callers.
pub fn viewer_has_liked<PS, AS, LS>(
    feed: &Feed<PS, AS, LS>,
    post: &Post,
    ctx: &Context,
) -> Result<bool>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    let Some(viewer) = ctx.current_user else {
        return Ok(false);
    };
    let filter = Filter::all()
        .eq("post_id", post.id)
        .eq("user_id", viewer);
    Ok(feed.likes().count(&filter)? > 0)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// A single post by id.
pub fn post<PS, AS, LS>(feed: &Feed<PS, AS, LS>, id: PostId) -> Result<Option<Post>>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    feed.posts().get(id)
}

/// Paginated posts, optionally only those written by `from_user`.
pub fn posts<PS, AS, LS>(
    feed: &Feed<PS, AS, LS>,
    args: &PaginationArgs,
    from_user: Option<UserId>,
) -> Result<Connection<Post>>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    let filter = match from_user {
        Some(user) => Filter::all().eq("user_id", user),
        None => Filter::all(),
    };
    feed.fetcher()
        .fetch_connection(feed.posts().as_ref(), &filter, args)
}

/// Paginated replies to the post `id`.
pub fn thread<PS, AS, LS>(
    feed: &Feed<PS, AS, LS>,
    args: &PaginationArgs,
    id: PostId,
) -> Result<Connection<Post>>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    let filter = Filter::all().eq("reply_to", id);
    feed.fetcher()
        .fetch_connection(feed.posts().as_ref(), &filter, args)
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Create a post as the caller and announce it to live subscribers.
///
/// Replies go out on [`Topic::NEW_REPLY`], everything else on
/// [`Topic::NEW_POST`]. The row is written before it is published.
///
/// The parent check and the insert are separate steps, so a reply can land
/// on a post deleted in between. Such a reply keeps its `reply_to` and
/// [`reply_post`] resolves it to `None`.
pub fn create_post<PS, AS, LS>(feed: &Feed<PS, AS, LS>, input: NewPost, ctx: &Context) -> Result<Post>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    let user_id = ctx.require_user()?;

    if input.body.trim().is_empty() {
        return Err(FeedError::InvalidArgument("post body must not be empty".into()));
    }
    if let Some(parent) = input.reply_to {
        if feed.posts().get(parent)?.is_none() {
            return Err(FeedError::NotFound(format!("post {}", parent)));
        }
    }

    let NewPost { body, reply_to } = input;
    let created = feed.posts().insert_with(|id| Post {
        id,
        user_id,
        body,
        reply_to,
        created_at: Timestamp::now(),
    })?;

    let topic = if created.is_reply() {
        Topic::NEW_REPLY
    } else {
        Topic::NEW_POST
    };
    let report = feed.publisher().publish(&topic, &created);

    tracing::debug!(
        post_id = created.id.0,
        user_id = user_id.0,
        topic = %topic,
        delivered = report.delivered,
        "post created"
    );

    Ok(created)
}

/// Delete one of the caller's own posts.
pub fn delete_post<PS, AS, LS>(feed: &Feed<PS, AS, LS>, id: PostId, ctx: &Context) -> Result<()>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    let user_id = ctx.require_user()?;

    let existing = feed
        .posts()
        .get(id)?
        .ok_or_else(|| FeedError::NotFound(format!("post {}", id)))?;
    if existing.user_id != user_id {
        return Err(FeedError::Forbidden(format!(
            "post {} belongs to another user",
            id
        )));
    }

    // A concurrent delete may have won the race.
    if !feed.posts().delete(id)? {
        return Err(FeedError::NotFound(format!("post {}", id)));
    }

    tracing::debug!(post_id = id.0, user_id = user_id.0, "post deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// Live top-level posts, optionally only those by `from_user`.
pub fn post_added<PS, AS, LS>(feed: &Feed<PS, AS, LS>, from_user: Option<UserId>) -> SubscriptionHandle<Post>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    feed.registry()
        .subscribe(Topic::NEW_POST, NewPostFilter { from_user })
}

/// Live replies to `to_post`.
pub fn reply_added<PS, AS, LS>(feed: &Feed<PS, AS, LS>, to_post: PostId) -> SubscriptionHandle<Post>
where
    PS: WriteSource<Post>,
    AS: DataSource<Account>,
    LS: DataSource<Like>,
{
    feed.registry()
        .subscribe(Topic::NEW_REPLY, ReplyFilter { to_post })
}
