//! Defines [`PostIndex`], the in-memory post collection along with its two
//! derived views: the tag index (tag → posts) and the date index
//! (year → month → posts).
//!
//! Both derived views store positions into the sorted collection rather than
//! copies of the posts, so they preserve collection order by construction and
//! are rebuilt from scratch whenever the collection changes.

use crate::post::Post;
use chrono::Datelike;
use std::collections::{BTreeMap, HashMap};

/// Posts grouped by year and then by 1-based month. Each bucket lists its
/// posts in collection order (most recent first).
pub type DateIndex<'a> = BTreeMap<i32, BTreeMap<u32, Vec<&'a Post>>>;

/// A tag along with the number of posts that carry it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagCount<'a> {
    pub name: &'a str,
    pub count: usize,
}

/// The posts carrying a single tag.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
struct TagEntry {
    name: String,
    posts: Vec<usize>,
}

/// The post collection, sorted by date (most recent first), and the tag and
/// date indices derived from it.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PostIndex {
    posts: Vec<Post>,

    /// Tag entries in order of first occurrence in `posts`.
    tags: Vec<TagEntry>,

    /// Maps a tag name onto its position in `tags`.
    tag_positions: HashMap<String, usize>,

    dates: BTreeMap<i32, BTreeMap<u32, Vec<usize>>>,
}

impl PostIndex {
    /// Builds an index from posts in manifest order.
    pub fn new(posts: Vec<Post>) -> PostIndex {
        let mut index = PostIndex {
            posts,
            ..PostIndex::default()
        };
        index.rebuild();
        index
    }

    /// Re-sorts the collection and derives the tag and date indices from it.
    /// Sorting is stable so posts sharing a date keep their manifest order.
    /// Rebuilding an unchanged collection yields an identical index.
    pub fn rebuild(&mut self) {
        self.posts.sort_by(|a, b| b.date.cmp(&a.date));
        self.tags.clear();
        self.tag_positions.clear();
        self.dates.clear();

        for (i, post) in self.posts.iter().enumerate() {
            for tag in post.tags.iter() {
                match self.tag_positions.get(tag) {
                    Some(&position) => self.tags[position].posts.push(i),
                    None => {
                        self.tag_positions.insert(tag.clone(), self.tags.len());
                        self.tags.push(TagEntry {
                            name: tag.clone(),
                            posts: vec![i],
                        });
                    }
                }
            }

            self.dates
                .entry(post.date.year())
                .or_default()
                .entry(post.date.month())
                .or_default()
                .push(i);
        }

        tracing::debug!(
            posts = self.posts.len(),
            tags = self.tags.len(),
            years = self.dates.len(),
            "rebuilt post index"
        );
    }

    /// Returns the posts, most recent first.
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Returns `true` if the collection holds no posts.
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Looks up a post by its slug.
    pub fn find(&self, slug: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.slug == slug)
    }

    /// Returns the posts carrying `tag` in collection order, or an empty
    /// vector if no post carries it.
    pub fn posts_by_tag(&self, tag: &str) -> Vec<&Post> {
        match self.tag_positions.get(tag) {
            Some(&position) => self.resolve(&self.tags[position].posts),
            None => Vec::new(),
        }
    }

    /// Returns the full date index.
    pub fn posts_by_date(&self) -> DateIndex<'_> {
        self.dates
            .iter()
            .map(|(&year, months)| {
                let months = months
                    .iter()
                    .map(|(&month, posts)| (month, self.resolve(posts)))
                    .collect();
                (year, months)
            })
            .collect()
    }

    /// Returns every tag with its post count, sorted by count (highest
    /// first). Tags with equal counts keep the order in which they first
    /// appear in the collection.
    pub fn tag_counts(&self) -> Vec<TagCount<'_>> {
        let mut counts: Vec<TagCount> = self
            .tags
            .iter()
            .map(|entry| TagCount {
                name: &entry.name,
                count: entry.posts.len(),
            })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts
    }

    fn resolve(&self, positions: &[usize]) -> Vec<&Post> {
        positions.iter().map(|&i| &self.posts[i]).collect()
    }
}
