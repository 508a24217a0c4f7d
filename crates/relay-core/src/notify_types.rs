//! Static per-kind notification configuration table.
//!
//! Each notification kind maps to a URL template, an anchor fragment,
//! and the prefix/suffix text the formatter wraps around the resolved
//! title. The table is immutable for the process lifetime; unknown
//! kinds are simply absent and the corresponding events are dropped.
//!
//! `merge_group` and `merge` mirror the source schema's message-merge
//! grouping. Several kinds share a group; the relay carries the data
//! through but implements no merge behavior.

/// Rendering configuration for one notification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyKindConfig {
    /// URL template; a trailing slash, if present, is stripped before
    /// the subject id is appended.
    pub url: &'static str,
    /// Mobile URL template, where one exists.
    pub url_mobile: Option<&'static str>,
    /// Fragment prepended to the related post id.
    pub anchor: &'static str,
    /// Text before the title.
    pub prefix: &'static str,
    /// Text after the title; empty for kinds that render no title.
    pub suffix: &'static str,
    /// Merge-grouping id shared by related kinds.
    pub merge_group: u32,
    /// Whether messages of this kind are eligible for merging.
    pub merge: bool,
}

/// Returns the configuration for a notification kind, or `None` for
/// unknown/legacy kinds.
#[must_use]
pub fn for_kind(kind: u32) -> Option<&'static NotifyKindConfig> {
    KINDS
        .binary_search_by_key(&kind, |(k, _)| *k)
        .ok()
        .map(|i| &KINDS[i].1)
}

macro_rules! kind {
    ($url:expr, $mobile:expr, $anchor:expr, $prefix:expr, $suffix:expr, $group:expr, $merge:expr) => {
        NotifyKindConfig {
            url: $url,
            url_mobile: $mobile,
            anchor: $anchor,
            prefix: $prefix,
            suffix: $suffix,
            merge_group: $group,
            merge: $merge,
        }
    };
}

/// The kind table, sorted by kind id. Kind 16 does not exist upstream.
static KINDS: &[(u32, NotifyKindConfig)] = &[
    (1, kind!("https://bgm.tv/group/topic", Some("MOBILE_URL/topic/group/"), "#post_", "在你的小组话题", "中发表了新回复", 1, true)),
    (2, kind!("https://bgm.tv/group/topic", Some("MOBILE_URL/topic/group/"), "#post_", "在小组话题", "中回复了你", 1, true)),
    (3, kind!("https://bgm.tv/subject/topic", Some("/topic/subject"), "#post_", "在你的条目讨论", "中发表了新回复", 3, true)),
    (4, kind!("https://bgm.tv/subject/topic/", Some("MOBILE_URL/topic/subject/"), "#post_", "在条目讨论", "中回复了你", 3, true)),
    (5, kind!("https://bgm.tv/character/", Some("MOBILE_URL/topic/crt/"), "#post_", "在角色讨论", "中发表了新回复", 5, true)),
    (6, kind!("https://bgm.tv/character/", Some("MOBILE_URL/topic/crt/"), "#post_", "在角色", "中回复了你", 5, true)),
    (7, kind!("/blog/", None, "#post_", "在你的日志", "中发表了新回复", 7, true)),
    (8, kind!("https://bgm.tv/blog/", None, "#post_", "在日志", "中回复了你", 7, true)),
    (9, kind!("https://bgm.tv/subject/ep/", Some("MOBILE_URL/topic/ep/"), "#post_", "在章节讨论", "中发表了新回复", 9, true)),
    (10, kind!("https://bgm.tv/subject/ep/", Some("MOBILE_URL/topic/ep/"), "#post_", "在章节讨论", "中回复了你", 9, true)),
    (11, kind!("https://bgm.tv/index/", None, "#post_", "在目录", "中给你留言了", 11, true)),
    (12, kind!("https://bgm.tv/index/", None, "#post_", "在目录", "中回复了你", 11, true)),
    (13, kind!("https://bgm.tv/person/", Some("MOBILE_URL/topic/prsn/"), "#post_", "在人物", "中回复了你", 13, true)),
    (14, kind!("https://bgm.tv/user/", None, "#", "请求与你成为好友", "", 14, false)),
    (15, kind!("https://bgm.tv/user/", None, "#", "通过了你的好友请求", "", 14, false)),
    (17, kind!("DOUJIN_URL/club/topic/", None, "#post_", "在你的社团讨论", "中发表了新回复", 17, true)),
    (18, kind!("DOUJIN_URL/club/topic/", None, "#post_", "在社团讨论", "中回复了你", 17, true)),
    (19, kind!("DOUJIN_URL/subject/", None, "#post_", "在同人作品", "中回复了你", 19, true)),
    (20, kind!("DOUJIN_URL/event/topic/", None, "#post_", "在你的展会讨论", "中发表了新回复", 20, true)),
    (21, kind!("DOUJIN_URL/event/topic/", None, "#post_", "在展会讨论", "中回复了你", 20, true)),
    (22, kind!("https://bgm.tv/user/chobits_user/timeline/status/", None, "#post_", r#"回复了你的 <a href="%2$s%3$s" class="nt_link link_%4$s" target="_blank">吐槽</a>"#, "", 22, true)),
    (23, kind!("https://bgm.tv/group/topic/", Some("MOBILE_URL/topic/group/"), "#post_", "在小组话题", "中提到了你", 1, true)),
    (24, kind!("https://bgm.tv/subject/topic/", Some("MOBILE_URL/topic/subject/"), "#post_", "在条目讨论", "中提到了你", 3, true)),
    (25, kind!("https://bgm.tv/character/", Some("MOBILE_URL/topic/crt/"), "#post_", "在角色", "中提到了你", 5, true)),
    (26, kind!("https://bgm.tv/person/", Some("MOBILE_URL/topic/prsn/"), "#post_", "在人物讨论", "中提到了你", 5, true)),
    (27, kind!("https://bgm.tv/index/", None, "#post_", "在目录", "中提到了你", 11, true)),
    (28, kind!("https://bgm.tv/user/chobits_user/timeline/status/", None, "#post_", "在", "中提到了你", 22, true)),
    (29, kind!("https://bgm.tv/blog/", None, "#post_", "在日志", "中提到了你", 7, true)),
    (30, kind!("https://bgm.tv/subject/ep/", Some("MOBILE_URL/topic/ep/"), "#post_", "在章节讨论", "中提到了你", 9, true)),
    (31, kind!("DOUJIN_URL/club/", None, "/shoutbox#post_", "在社团", "的留言板中提到了你", 31, true)),
    (32, kind!("DOUJIN_URL/club/topic/", None, "#post_", "在社团讨论", "中提到了你", 17, true)),
    (33, kind!("DOUJIN_URL/subject/", None, "#post_", "在同人作品", "中提到了你", 19, true)),
    (34, kind!("DOUJIN_URL/event/topic/", None, "#post_", "在展会讨论", "中提到了你", 20, true)),
];
