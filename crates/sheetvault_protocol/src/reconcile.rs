//! Version reconciliation.
//!
//! Every sheet mutation carries the version the client last synced (its
//! baseline). [`reconcile`] compares that baseline with the store's current
//! version and decides whether the mutation applies, was already applied, or
//! conflicts with a concurrent edit.
//!
//! ## Decision Table
//!
//! | Stored state | Kind | Condition | Decision |
//! |---|---|---|---|
//! | absent | create / content | baseline 0 | accept v1, mint key |
//! | absent | create / content | baseline > 0 | conflict |
//! | absent | sort order / delete | - | missing |
//! | any | any | claimed key differs | conflict |
//! | tombstone | delete | - | already applied |
//! | tombstone | sort order | - | conflict |
//! | tombstone | create / content | baseline = current | accept (revive) |
//! | live | sort order | unchanged | already applied |
//! | live | sort order | - | accept |
//! | live | create / content / delete | baseline = current, unchanged | already applied |
//! | live | create / content / delete | baseline = current | accept |
//! | live | create / content / delete | claimed next = current, unchanged | already applied |
//! | otherwise | | | conflict |
//!
//! Sort-order updates skip the baseline comparison so a reorder is never lost
//! to an unrelated content edit, but they still advance the version.

/// The kind of mutation being applied to a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// First write of a key the client has never synced.
    Create,
    /// Replace the sheet content (payload and summary).
    UpdateContent,
    /// Change only the sort order.
    UpdateSortOrder,
    /// Tombstone the sheet.
    Delete,
}

impl MutationKind {
    /// Returns true if the mutation replaces sheet content.
    #[must_use]
    pub fn writes_content(self) -> bool {
        matches!(self, Self::Create | Self::UpdateContent)
    }
}

/// The version metadata of a stored sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionState {
    /// Current version.
    pub version: u32,
    /// Version key issued at creation.
    pub version_key: u32,
    /// Whether the sheet is tombstoned.
    pub deleted: bool,
}

/// How the accepted record obtains its version key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionKeyAssignment {
    /// New key; the caller mints one.
    Mint,
    /// Existing key, carried forward unchanged.
    Keep(u32),
}

/// Everything the reconciler looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileInput {
    /// Stored state, `None` if the key has never existed.
    pub current: Option<VersionState>,
    /// Requested mutation.
    pub kind: MutationKind,
    /// Version the client last synced (0 = never).
    pub baseline: u32,
    /// Version the client expects the mutation to produce.
    pub claimed_version: Option<u32>,
    /// Version key the client holds for the sheet.
    pub claimed_version_key: Option<u32>,
    /// Whether applying the mutation would leave the stored record as it is.
    pub unchanged: bool,
}

impl ReconcileInput {
    /// Creates an input for a mutation against an absent key.
    #[must_use]
    pub fn new(kind: MutationKind, baseline: u32) -> Self {
        Self {
            current: None,
            kind,
            baseline,
            claimed_version: None,
            claimed_version_key: None,
            unchanged: false,
        }
    }

    /// Sets the stored state.
    #[must_use]
    pub fn against(mut self, current: Option<VersionState>) -> Self {
        self.current = current;
        self
    }

    /// Sets the version the client expects to produce.
    #[must_use]
    pub fn claiming_version(mut self, version: u32) -> Self {
        self.claimed_version = Some(version);
        self
    }

    /// Sets the version key the client holds.
    #[must_use]
    pub fn claiming_version_key(mut self, version_key: Option<u32>) -> Self {
        self.claimed_version_key = version_key;
        self
    }

    /// Marks the mutation as a no-op against the stored record.
    #[must_use]
    pub fn unchanged(mut self, unchanged: bool) -> Self {
        self.unchanged = unchanged;
        self
    }
}

/// Outcome of [`reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Apply the mutation and store it as `next_version`.
    Accept {
        /// Version of the new record.
        next_version: u32,
        /// Version key of the new record.
        version_key: VersionKeyAssignment,
    },
    /// The stored record already reflects the mutation; report success
    /// without writing.
    AlreadyApplied {
        /// Stored state, unchanged.
        current: VersionState,
    },
    /// The client's view is stale; nothing is written.
    Conflict {
        /// Stored state, `None` if the key does not exist.
        current: Option<VersionState>,
    },
    /// The mutation needs an existing sheet and there is none.
    Missing,
}

impl Decision {
    /// Returns true for decisions reported to the client as success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Accept { .. } | Self::AlreadyApplied { .. })
    }
}

/// Decides the fate of a single sheet mutation.
#[must_use]
pub fn reconcile(input: &ReconcileInput) -> Decision {
    let Some(current) = input.current else {
        return match input.kind {
            MutationKind::UpdateSortOrder | MutationKind::Delete => Decision::Missing,
            MutationKind::Create | MutationKind::UpdateContent if input.baseline == 0 => {
                Decision::Accept {
                    next_version: 1,
                    version_key: VersionKeyAssignment::Mint,
                }
            }
            MutationKind::Create | MutationKind::UpdateContent => {
                Decision::Conflict { current: None }
            }
        };
    };

    let conflict = Decision::Conflict {
        current: Some(current),
    };

    if input
        .claimed_version_key
        .is_some_and(|key| key != current.version_key)
    {
        return conflict;
    }

    if current.deleted {
        return match input.kind {
            MutationKind::Delete => Decision::AlreadyApplied { current },
            MutationKind::UpdateSortOrder => conflict,
            MutationKind::Create | MutationKind::UpdateContent => {
                if input.baseline == current.version {
                    advance(current)
                } else {
                    conflict
                }
            }
        };
    }

    if input.kind == MutationKind::UpdateSortOrder {
        return if input.unchanged {
            Decision::AlreadyApplied { current }
        } else {
            advance(current)
        };
    }

    if input.baseline == current.version {
        if input.unchanged {
            Decision::AlreadyApplied { current }
        } else {
            advance(current)
        }
    } else if input.unchanged && input.claimed_version == Some(current.version) {
        // Retry of a write whose response never reached the client.
        Decision::AlreadyApplied { current }
    } else {
        conflict
    }
}

fn advance(current: VersionState) -> Decision {
    match current.version.checked_add(1) {
        Some(next_version) => Decision::Accept {
            next_version,
            version_key: VersionKeyAssignment::Keep(current.version_key),
        },
        // Version space exhausted; the key can take no further writes.
        None => Decision::Conflict {
            current: Some(current),
        },
    }
}
