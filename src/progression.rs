//! # Progressions and Songs
//!
//! A progression is a tree of chord nodes: each node may branch into
//! alternative continuations. Nodes live in an arena and refer to each other
//! by [`NodeId`]; the tree owns the parent/child links and notifies
//! [`ProgressionObserver`]s of every edit.
//!
//! ## Effective Pattern
//! A node plays its own pattern when it has one. Otherwise it inherits the
//! pattern of its nearest ancestor that has one, and falls back to a block
//! chord when no ancestor does.
//!
//! Songs arrange [`SongSection`]s; each section keeps four parallel arrays
//! (chords, voicing indices, strum ids, arpeggio ids) that the arranger
//! operations keep equal in length.

use serde::{Deserialize, Serialize};

use crate::playback::PlaybackItem;
use crate::rhythm::PatternRef;

/// Arena index of a progression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// Which of a node's patterns plays when both are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStyle {
    Block,
    Strum,
    Arpeggio,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionNode {
    pub chord: String,
    pub voicing_index: usize,
    pub strum_pattern_id: Option<String>,
    pub arpeggio_pattern_id: Option<String>,
    pub playback_style: Option<PlaybackStyle>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl ProgressionNode {
    fn new(chord: &str, parent: Option<NodeId>) -> Self {
        ProgressionNode {
            chord: chord.to_string(),
            voicing_index: 0,
            strum_pattern_id: None,
            arpeggio_pattern_id: None,
            playback_style: None,
            parent,
            children: Vec::new(),
        }
    }

    /// The pattern set on this node, ignoring ancestors.
    ///
    /// With both ids set the playback style picks one (strum unless told
    /// otherwise); an explicit block style on a node with patterns plays block.
    pub fn own_pattern(&self) -> Option<PatternRef> {
        let strum = self.strum_pattern_id.clone();
        let arpeggio = self.arpeggio_pattern_id.clone();
        match (self.playback_style, strum, arpeggio) {
            (_, None, None) => None,
            (Some(PlaybackStyle::Block), _, _) => Some(PatternRef::Block),
            (Some(PlaybackStyle::Arpeggio), _, Some(id)) => Some(PatternRef::Arpeggio(id)),
            (_, Some(id), _) => Some(PatternRef::Strum(id)),
            (_, None, Some(id)) => Some(PatternRef::Arpeggio(id)),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Tree edits reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEvent {
    Added(NodeId),
    Removed(NodeId),
    ChordChanged(NodeId),
    VoicingChanged(NodeId),
    /// The node's own pattern changed; descendants that inherit it are affected too.
    PatternChanged(NodeId),
}

pub trait ProgressionObserver {
    fn on_change(&mut self, event: TreeEvent);
}

#[derive(Default)]
pub struct ProgressionTree {
    nodes: Vec<Option<ProgressionNode>>,
    roots: Vec<NodeId>,
    observers: Vec<Box<dyn ProgressionObserver>>,
}

impl ProgressionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn ProgressionObserver>) {
        self.observers.push(observer);
    }

    fn notify(&mut self, event: TreeEvent) {
        for observer in self.observers.iter_mut() {
            observer.on_change(event);
        }
    }

    fn alloc(&mut self, node: ProgressionNode) -> NodeId {
        self.nodes.push(Some(node));
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_root(&mut self, chord: &str) -> NodeId {
        let id = self.alloc(ProgressionNode::new(chord, None));
        self.roots.push(id);
        self.notify(TreeEvent::Added(id));
        id
    }

    /// Append a child to `parent`; `None` when the parent does not exist.
    pub fn add_child(&mut self, parent: NodeId, chord: &str) -> Option<NodeId> {
        self.get(parent)?;
        let id = self.alloc(ProgressionNode::new(chord, Some(parent)));
        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        self.notify(TreeEvent::Added(id));
        Some(id)
    }

    /// Remove a node. Its children take its place under its parent.
    pub fn remove(&mut self, id: NodeId) -> Option<ProgressionNode> {
        let node = self.nodes.get_mut(id.0)?.take()?;
        for child in &node.children {
            if let Some(c) = self.get_mut(*child) {
                c.parent = node.parent;
            }
        }
        match node.parent {
            Some(p) => {
                if let Some(parent) = self.get_mut(p) {
                    replace_child(&mut parent.children, id, &node.children);
                }
            }
            None => replace_child(&mut self.roots, id, &node.children),
        }
        self.notify(TreeEvent::Removed(id));
        Some(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&ProgressionNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut ProgressionNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn edit(&mut self, id: NodeId, event: TreeEvent, f: impl FnOnce(&mut ProgressionNode)) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                f(node);
                self.notify(event);
                true
            }
            None => false,
        }
    }

    pub fn set_chord(&mut self, id: NodeId, chord: &str) -> bool {
        self.edit(id, TreeEvent::ChordChanged(id), |n| n.chord = chord.to_string())
    }

    pub fn set_voicing_index(&mut self, id: NodeId, index: usize) -> bool {
        self.edit(id, TreeEvent::VoicingChanged(id), |n| n.voicing_index = index)
    }

    pub fn set_strum_pattern(&mut self, id: NodeId, pattern: Option<String>) -> bool {
        self.edit(id, TreeEvent::PatternChanged(id), |n| n.strum_pattern_id = pattern)
    }

    pub fn set_arpeggio_pattern(&mut self, id: NodeId, pattern: Option<String>) -> bool {
        self.edit(id, TreeEvent::PatternChanged(id), |n| n.arpeggio_pattern_id = pattern)
    }

    pub fn set_playback_style(&mut self, id: NodeId, style: Option<PlaybackStyle>) -> bool {
        self.edit(id, TreeEvent::PatternChanged(id), |n| n.playback_style = style)
    }

    /// Walk from `id` towards the root and take the first pattern found.
    pub fn effective_pattern(&self, id: NodeId) -> PatternRef {
        let mut cursor = self.get(id);
        while let Some(node) = cursor {
            if let Some(pattern) = node.own_pattern() {
                return pattern;
            }
            cursor = node.parent.and_then(|p| self.get(p));
        }
        PatternRef::Block
    }

    /// Nodes from the root down to `id`, inclusive; empty for a missing node.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut cursor = self.get(id).map(|_| id);
        while let Some(current) = cursor {
            path.push(current);
            cursor = self.get(current).and_then(|n| n.parent);
        }
        path.reverse();
        path
    }

    /// Every node in pre-order, roots left to right.
    pub fn depth_first(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get(id) {
                order.push(id);
                stack.extend(node.children.iter().rev());
            }
        }
        order
    }

    /// Playback items for the given nodes, in order, with inherited patterns resolved.
    pub fn playback_items(&self, ids: &[NodeId]) -> Vec<PlaybackItem> {
        ids.iter()
            .filter_map(|&id| {
                let node = self.get(id)?;
                Some(PlaybackItem {
                    chord: node.chord.clone(),
                    voicing_index: node.voicing_index,
                    pattern: self.effective_pattern(id),
                    node: Some(id),
                })
            })
            .collect()
    }
}

fn replace_child(siblings: &mut Vec<NodeId>, id: NodeId, replacement: &[NodeId]) {
    if let Some(position) = siblings.iter().position(|&s| s == id) {
        siblings.splice(position..=position, replacement.iter().copied());
    }
}

fn move_within<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    true
}

/// A song section: parallel per-slot arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongSection {
    pub id: String,
    pub label: String,
    pub chords: Vec<String>,
    #[serde(default)]
    pub voicing_indices: Vec<usize>,
    #[serde(default)]
    pub strum_pattern_ids: Vec<Option<String>>,
    #[serde(default)]
    pub arpeggio_pattern_ids: Vec<Option<String>>,
}

impl SongSection {
    pub fn new(id: &str, label: &str) -> Self {
        SongSection {
            id: id.to_string(),
            label: label.to_string(),
            chords: Vec::new(),
            voicing_indices: Vec::new(),
            strum_pattern_ids: Vec::new(),
            arpeggio_pattern_ids: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    pub fn is_consistent(&self) -> bool {
        let n = self.chords.len();
        self.voicing_indices.len() == n
            && self.strum_pattern_ids.len() == n
            && self.arpeggio_pattern_ids.len() == n
    }

    /// Pad or cut the per-slot arrays to one entry per chord.
    pub fn align(&mut self) {
        let n = self.chords.len();
        if !self.is_consistent() {
            tracing::warn!("section '{}' has misaligned slot arrays, realigning", self.id);
        }
        self.voicing_indices.resize(n, 0);
        self.strum_pattern_ids.resize(n, None);
        self.arpeggio_pattern_ids.resize(n, None);
    }

    pub fn push_chord(&mut self, chord: &str) {
        self.insert_chord(self.len(), chord);
    }

    /// Insert at `index`, clamped to the end.
    pub fn insert_chord(&mut self, index: usize, chord: &str) {
        self.align();
        let index = index.min(self.len());
        self.chords.insert(index, chord.to_string());
        self.voicing_indices.insert(index, 0);
        self.strum_pattern_ids.insert(index, None);
        self.arpeggio_pattern_ids.insert(index, None);
    }

    pub fn remove_chord(&mut self, index: usize) -> Option<String> {
        if index >= self.len() {
            return None;
        }
        self.align();
        self.voicing_indices.remove(index);
        self.strum_pattern_ids.remove(index);
        self.arpeggio_pattern_ids.remove(index);
        Some(self.chords.remove(index))
    }

    pub fn move_chord(&mut self, from: usize, to: usize) -> bool {
        if !self.is_consistent() || from >= self.len() || to >= self.len() {
            return false;
        }
        move_within(&mut self.chords, from, to)
            && move_within(&mut self.voicing_indices, from, to)
            && move_within(&mut self.strum_pattern_ids, from, to)
            && move_within(&mut self.arpeggio_pattern_ids, from, to)
    }

    pub fn set_voicing_index(&mut self, index: usize, voicing: usize) -> bool {
        match self.voicing_indices.get_mut(index) {
            Some(slot) => {
                *slot = voicing;
                true
            }
            None => false,
        }
    }

    /// Set the pattern of one slot; `Block` clears both ids.
    pub fn set_pattern(&mut self, index: usize, pattern: PatternRef) -> bool {
        if index >= self.len() {
            return false;
        }
        let (strum, arpeggio) = match pattern {
            PatternRef::Block => (None, None),
            PatternRef::Strum(id) => (Some(id), None),
            PatternRef::Arpeggio(id) => (None, Some(id)),
        };
        match (
            self.strum_pattern_ids.get_mut(index),
            self.arpeggio_pattern_ids.get_mut(index),
        ) {
            (Some(strum_slot), Some(arpeggio_slot)) => {
                *strum_slot = strum;
                *arpeggio_slot = arpeggio;
                true
            }
            _ => false,
        }
    }

    pub fn pattern_at(&self, index: usize) -> PatternRef {
        if let Some(Some(id)) = self.strum_pattern_ids.get(index) {
            return PatternRef::Strum(id.clone());
        }
        if let Some(Some(id)) = self.arpeggio_pattern_ids.get(index) {
            return PatternRef::Arpeggio(id.clone());
        }
        PatternRef::Block
    }

    pub fn items(&self) -> Vec<PlaybackItem> {
        self.chords
            .iter()
            .enumerate()
            .map(|(i, chord)| PlaybackItem {
                chord: chord.clone(),
                voicing_index: self.voicing_indices.get(i).copied().unwrap_or(0),
                pattern: self.pattern_at(i),
                node: None,
            })
            .collect()
    }
}

/// A song: sections plus the order they play in (ids may repeat).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub name: String,
    #[serde(default)]
    pub structure: Vec<String>,
    #[serde(default)]
    pub sections: Vec<SongSection>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Song {
    pub fn new(name: &str) -> Self {
        Song {
            name: name.to_string(),
            structure: Vec::new(),
            sections: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn section(&self, id: &str) -> Option<&SongSection> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn section_mut(&mut self, id: &str) -> Option<&mut SongSection> {
        self.sections.iter_mut().find(|s| s.id == id)
    }

    /// Add a section and append it to the structure.
    pub fn add_section(&mut self, section: SongSection) {
        self.structure.push(section.id.clone());
        self.sections.push(section);
    }

    /// Insert a reference to an existing section into the structure.
    pub fn insert_in_structure(&mut self, index: usize, section_id: &str) -> bool {
        if self.section(section_id).is_none() {
            return false;
        }
        let index = index.min(self.structure.len());
        self.structure.insert(index, section_id.to_string());
        true
    }

    pub fn remove_from_structure(&mut self, index: usize) -> Option<String> {
        (index < self.structure.len()).then(|| self.structure.remove(index))
    }

    pub fn move_in_structure(&mut self, from: usize, to: usize) -> bool {
        move_within(&mut self.structure, from, to)
    }

    /// Delete a section and every structure reference to it.
    pub fn remove_section(&mut self, id: &str) -> Option<SongSection> {
        let position = self.sections.iter().position(|s| s.id == id)?;
        self.structure.retain(|s| s != id);
        Some(self.sections.remove(position))
    }

    /// Sections in play order; dangling structure ids are skipped.
    pub fn play_order(&self) -> Vec<&SongSection> {
        self.structure
            .iter()
            .filter_map(|id| {
                let section = self.section(id);
                if section.is_none() {
                    tracing::warn!("song '{}' refers to missing section '{}'", self.name, id);
                }
                section
            })
            .collect()
    }

    pub fn is_consistent(&self) -> bool {
        self.sections.iter().all(SongSection::is_consistent)
    }

    pub fn align(&mut self) {
        self.sections.iter_mut().for_each(SongSection::align);
    }
}
