// Inverse Association Management - every social edge is stored on both ends
// Writing one side always writes its inverse in the same transaction

/// Edge types kept in the `associations` table, keyed `(id1, atype, id2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationType {
    /// user -> user the user follows
    Following,
    /// user -> user following them
    Followers,
    /// user -> post the user liked
    LikedPosts,
    /// post -> user who liked it
    LikedBy,
}

impl AssociationType {
    pub fn as_str(self) -> &'static str {
        match self {
            AssociationType::Following => "following",
            AssociationType::Followers => "followers",
            AssociationType::LikedPosts => "liked_posts",
            AssociationType::LikedBy => "liked_by",
        }
    }

    pub fn inverse(self) -> AssociationType {
        match self {
            AssociationType::Following => AssociationType::Followers,
            AssociationType::Followers => AssociationType::Following,
            AssociationType::LikedPosts => AssociationType::LikedBy,
            AssociationType::LikedBy => AssociationType::LikedPosts,
        }
    }

    /// Table holding the entity an edge of this type points at.
    pub fn target_table(self) -> &'static str {
        match self {
            AssociationType::LikedPosts => "posts",
            AssociationType::Following | AssociationType::Followers | AssociationType::LikedBy => "users",
        }
    }

    pub fn parse(raw: &str) -> Option<AssociationType> {
        match raw {
            "following" => Some(AssociationType::Following),
            "followers" => Some(AssociationType::Followers),
            "liked_posts" => Some(AssociationType::LikedPosts),
            "liked_by" => Some(AssociationType::LikedBy),
            _ => None,
        }
    }
}

/// Result of toggling an edge pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeToggle {
    Added,
    Removed,
}
