//! # Access Path Planning
//!
//! Builds an executable access plan from a predicate tree whose nodes the
//! plan enumerator already tagged with index assignments. This is a single
//! top-down pass: logical nodes assemble their children's scans, leaf
//! predicates become scan leaves, and whatever the chosen bounds cannot
//! answer survives as a filter on a scan or a fetch above it.
//!
//! ## Assembly Flow
//!
//! 1. `build_indexed_data_access` dispatches on the node: logical,
//!    bounds-generating leaf, or array operator
//! 2. `process_index_scans` walks an AND/OR's tagged children, folding
//!    consecutive predicates over the same index into one scan leaf by
//!    compounding later key fields or combining bounds on the current one
//! 3. `make_leaf_node` / `merge_with_leaf_node` / `finish_leaf_node` build,
//!    extend and finalize a single scan leaf
//! 4. `build_indexed_and` / `build_indexed_or` pick the combinator
//!    (sorted vs. hashed intersection, merge-sort vs. plain union) and hang
//!    residual predicates above the result with a fetch
//!
//! ## Multikey Soundness
//!
//! The guiding question when folding two predicates into one scan: must the
//! values under test come from the same array element? Compounding into an
//! unfilled key field is always allowed (the enumerator vouched for it),
//! but intersecting bounds on an already-constrained field of a multikey
//! index is not - different array elements could each satisfy one half of
//! the intersection. Unions are sound either way.
//!
//! The predicate tree is consumed: exactly-answered predicates are
//! destroyed, covered ones re-parent onto scan filters, residuals move
//! under fetch nodes.

use crate::bounds::{builder, BoundsTightness, IndexBounds, SimpleRange};
use crate::catalog::{IndexEntry, IndexType, KeyKind};
use crate::matcher::{indexability, IndexTag, MatchExpression, MatchKind};
use crate::types::Value;
use eyre::{bail, ensure, Result};
use tracing::warn;

use super::node::{
    AndHashNode, AndSortedNode, CollectionScanNode, FetchNode, Geo2dNode, GeoNear2dSphereNode,
    IndexScanNode, MergeSortNode, OrNode, PlanNode, ScanDirection, TextNode,
};
use super::query::CanonicalQuery;

/// How two predicates over the same scan combine, mirroring the logical
/// node that owns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CombineKind {
    And,
    Or,
}

/// Builds access plans for one query against one index catalog.
pub struct AccessPlanner<'a> {
    query: &'a CanonicalQuery,
    indices: &'a [IndexEntry],
}

impl<'a> AccessPlanner<'a> {
    pub fn new(query: &'a CanonicalQuery, indices: &'a [IndexEntry]) -> Self {
        Self { query, indices }
    }

    /// Transforms a tagged predicate tree into an access plan.
    ///
    /// Consumes the tree. `Ok(None)` means this tagging cannot be turned
    /// into a plan and the caller should try another enumeration candidate;
    /// `Err` means an enumerator precondition was broken.
    pub fn build_indexed_data_access(&self, root: MatchExpression) -> Result<Option<PlanNode>> {
        let mut root = root;
        self.build_access(&mut root, false)
    }

    fn build_access(
        &self,
        root: &mut MatchExpression,
        in_array_operator: bool,
    ) -> Result<Option<PlanNode>> {
        if root.is_logical() && !indexability::is_bounds_generating_not(root) {
            return match root.kind() {
                MatchKind::And => self.build_indexed_and(root, in_array_operator),
                MatchKind::Or => self.build_indexed_or(root, in_array_operator),
                // A negated conjunction or disjunction cannot be indexed.
                _ => Ok(None),
            };
        }

        // Leaf-like: one field, one tag.
        if Self::leaf_tag(root).is_none() {
            return Ok(None);
        }

        if indexability::is_bounds_generating(root) {
            let tag = match Self::leaf_tag(root) {
                Some(tag) => tag,
                None => return Ok(None),
            };
            ensure!(
                tag.index() < self.indices.len(),
                "index tag {} outside the catalog",
                tag
            );
            let index = &self.indices[tag.index()];
            let (mut leaf, tightness) = self.make_leaf_node(index, tag.position(), root)?;
            self.finish_leaf_node(&mut leaf, index)?;

            // Inside an array operator the parent re-applies the whole
            // predicate per element; the bare scan is enough here.
            if in_array_operator {
                return Ok(Some(leaf));
            }

            if tightness == BoundsTightness::Exact {
                return Ok(Some(leaf));
            }
            if tightness == BoundsTightness::InexactCovered && !index.multikey() {
                if let Some(slot) = leaf.filter_mut() {
                    *slot = Some(std::mem::take(root));
                }
                return Ok(Some(leaf));
            }
            return Ok(Some(PlanNode::Fetch(FetchNode {
                filter: Some(std::mem::take(root)),
                child: Box::new(leaf),
            })));
        }

        if indexability::array_uses_index_on_children(root) {
            let solution = match root.kind() {
                MatchKind::All => {
                    let mut children = Vec::new();
                    for child in root.children_mut() {
                        if let Some(node) = self.build_access(child, true)? {
                            children.push(node);
                        }
                    }
                    if children.is_empty() {
                        return Ok(None);
                    }
                    if children.len() == 1 {
                        children.swap_remove(0)
                    } else {
                        PlanNode::AndHash(AndHashNode { children })
                    }
                }
                MatchKind::ElemMatchObject => {
                    ensure!(
                        root.num_children() == 1,
                        "elemMatch over objects must hold exactly one child"
                    );
                    let child = match root.child_mut(0) {
                        Some(child) => child,
                        None => return Ok(None),
                    };
                    match self.build_access(child, true)? {
                        Some(node) => node,
                        None => return Ok(None),
                    }
                }
                other => bail!("{} is not an indexed array operator", other.name()),
            };

            if in_array_operator {
                return Ok(Some(solution));
            }
            return Ok(Some(PlanNode::Fetch(FetchNode {
                filter: Some(std::mem::take(root)),
                child: Box::new(solution),
            })));
        }

        Ok(None)
    }

    /// The index assignment governing a leaf-like node. Negations carry
    /// the assignment on the negated predicate.
    fn leaf_tag(expr: &MatchExpression) -> Option<IndexTag> {
        if matches!(expr.kind(), MatchKind::Not) {
            expr.child(0).and_then(|c| c.tag()).copied()
        } else {
            expr.tag().copied()
        }
    }

    fn build_indexed_and(
        &self,
        root: &mut MatchExpression,
        in_array_operator: bool,
    ) -> Result<Option<PlanNode>> {
        let mut scans = match self.process_index_scans(root, in_array_operator)? {
            Some(scans) => scans,
            None => return Ok(None),
        };

        // The enumerator only hands over an AND it indexed at least one
        // child of.
        ensure!(!scans.is_empty(), "indexed AND produced no scans");

        let mut and_result = if scans.len() == 1 {
            scans.swap_remove(0)
        } else if scans.iter().all(PlanNode::sorted_by_record_id) {
            PlanNode::AndSorted(AndSortedNode { children: scans })
        } else {
            // Hash intersection streams its last child, so a child that
            // already provides the requested sort goes last.
            let requested = self.query.parsed().sort();
            if !requested.is_empty() {
                let provider = scans
                    .iter()
                    .position(|scan| scan.provided_sorts().contains(requested));
                if let Some(i) = provider {
                    let last = scans.len() - 1;
                    scans.swap(i, last);
                }
            }
            PlanNode::AndHash(AndHashNode { children: scans })
        };

        // An enclosing array operator re-checks everything itself.
        if in_array_operator {
            return Ok(Some(and_result));
        }

        if root.num_children() > 0 {
            // An AND of one thing is that thing.
            let filter = if root.num_children() == 1 {
                root.take_child(0)
            } else {
                std::mem::take(root)
            };
            and_result = PlanNode::Fetch(FetchNode {
                filter: Some(filter),
                child: Box::new(and_result),
            });
        }

        Ok(Some(and_result))
    }

    fn build_indexed_or(
        &self,
        root: &mut MatchExpression,
        in_array_operator: bool,
    ) -> Result<Option<PlanNode>> {
        let mut scans = match self.process_index_scans(root, in_array_operator)? {
            Some(scans) => scans,
            None => return Ok(None),
        };

        // Residual filters cannot rise above an OR; they would apply to the
        // wrong branch. Every child must have been answered by an index.
        if !in_array_operator && root.num_children() > 0 {
            warn!(
                ns = self.query.ns(),
                "non-indexed child of OR, no indexed plan for the disjunction"
            );
            return Ok(None);
        }

        ensure!(!scans.is_empty(), "indexed OR produced no scans");

        let mut or_result = if scans.len() == 1 {
            scans.swap_remove(0)
        } else {
            let requested = self.query.parsed().sort();
            let mut merge_sort = false;
            if !requested.is_empty() {
                let mut shared = scans[0].provided_sorts();
                for scan in &scans[1..] {
                    if shared.is_empty() {
                        break;
                    }
                    let sorts = scan.provided_sorts();
                    shared = shared.intersection(&sorts).cloned().collect();
                }
                merge_sort = shared.contains(requested);
            }
            if merge_sort {
                PlanNode::MergeSort(MergeSortNode {
                    sort: requested.clone(),
                    children: scans,
                })
            } else {
                PlanNode::Or(OrNode { children: scans })
            }
        };

        // Text scores must be materialized before anything consumes them,
        // so text children run first.
        match &mut or_result {
            PlanNode::Or(n) => stable_partition_text_first(&mut n.children),
            PlanNode::MergeSort(n) => stable_partition_text_first(&mut n.children),
            _ => {}
        }

        Ok(Some(or_result))
    }

    /// Walks the tagged prefix of `root`'s children, emitting one completed
    /// scan per distinct index run plus recursively built subtrees.
    ///
    /// `Ok(None)` propagates a recursion that found no plan. Untagged
    /// children are left attached to `root`.
    fn process_index_scans(
        &self,
        root: &mut MatchExpression,
        in_array_operator: bool,
    ) -> Result<Option<Vec<PlanNode>>> {
        let combine = match root.kind() {
            MatchKind::And => CombineKind::And,
            MatchKind::Or => CombineKind::Or,
            other => bail!("scan assembly over a {} node", other.name()),
        };

        let mut out: Vec<PlanNode> = Vec::new();
        let mut current_scan: Option<PlanNode> = None;
        let mut current_index: Option<usize> = None;
        let mut cur_child = 0;

        while cur_child < root.num_children() {
            let (has_tag, bounds_generating, em_object, negation) = {
                let child = &root.children()[cur_child];
                (
                    child.tag().is_some(),
                    indexability::is_bounds_generating(child),
                    matches!(child.kind(), MatchKind::ElemMatchObject),
                    matches!(child.kind(), MatchKind::Not),
                )
            };

            // Tagged children sort first; the untagged suffix stays on
            // `root` for the caller to cover.
            if !has_tag {
                break;
            }

            if !bounds_generating {
                if combine == CombineKind::And && em_object {
                    // The enumerator asked us to compound with predicates
                    // from inside this elemMatch. Merge them into the
                    // current scan, but leave the elemMatch itself on the
                    // AND: the fetch above must re-check the whole thing
                    // per array element.
                    let mut em_children = Vec::new();
                    find_elem_match_children(&root.children()[cur_child], &mut em_children);
                    for em_child in &em_children {
                        self.assemble_elem_match_predicate(
                            em_child,
                            &mut current_scan,
                            &mut current_index,
                            &mut out,
                        )?;
                    }
                    cur_child += 1;
                } else if !in_array_operator {
                    // The subtree evaluates itself fully; its filters and
                    // fetches are already hung on it.
                    let mut detached = root.take_child(cur_child);
                    match self.build_access(&mut detached, in_array_operator)? {
                        Some(node) => out.push(node),
                        None => return Ok(None),
                    }
                    // Detaching shifted the next child into this slot.
                } else {
                    let child = &mut root.children_mut()[cur_child];
                    match self.build_access(child, in_array_operator)? {
                        Some(node) => out.push(node),
                        None => return Ok(None),
                    }
                    cur_child += 1;
                }
                continue;
            }

            let tag = if negation {
                match root.children()[cur_child]
                    .child(0)
                    .and_then(|c| c.tag())
                    .copied()
                {
                    Some(tag) => tag,
                    None => bail!("tagged negation without a tagged child"),
                }
            } else {
                match root.children()[cur_child].tag().copied() {
                    Some(tag) => tag,
                    None => break,
                }
            };
            ensure!(
                tag.index() < self.indices.len(),
                "index tag {} outside the catalog",
                tag
            );
            let index = &self.indices[tag.index()];

            let mut do_merge = false;
            if current_index == Some(tag.index()) {
                if let Some(scan) = current_scan.as_ref() {
                    do_merge = should_merge_with_leaf(
                        &root.children()[cur_child],
                        index,
                        tag.position(),
                        scan,
                        combine,
                    );
                }
            }

            if do_merge {
                let tightness = match current_scan.as_mut() {
                    Some(scan) => self.merge_with_leaf_node(
                        &root.children()[cur_child],
                        index,
                        tag.position(),
                        scan,
                        combine,
                    )?,
                    None => bail!("merge without a scan in progress"),
                };

                if tightness == BoundsTightness::Exact {
                    // The bounds answer the predicate; drop it.
                    root.take_child(cur_child);
                } else if tightness == BoundsTightness::InexactCovered
                    && (index.index_type() == IndexType::Text || !index.multikey())
                {
                    // The key holds enough to recheck during the scan. Not
                    // on a multikey index: the filter would only ever see
                    // one of the element keys.
                    let child = root.take_child(cur_child);
                    if let Some(scan) = current_scan.as_mut() {
                        add_filter_to_node(scan, child, combine);
                    }
                } else if combine == CombineKind::Or {
                    // An AND residual can ride above the AND; an OR
                    // residual applies to this branch only, so fetch here.
                    if let Some(mut scan) = current_scan.take() {
                        self.finish_leaf_node(&mut scan, index)?;
                        let child = root.take_child(cur_child);
                        out.push(PlanNode::Fetch(FetchNode {
                            filter: Some(child),
                            child: Box::new(scan),
                        }));
                    }
                    current_index = None;
                } else {
                    // Keep the child on the AND for the fetch above.
                    cur_child += 1;
                }
            } else {
                // Different index (or unmergeable): emit the scan in
                // progress and start a new leaf.
                if let Some(mut scan) = current_scan.take() {
                    let finished = match current_index {
                        Some(i) => &self.indices[i],
                        None => bail!("scan in progress without an index"),
                    };
                    self.finish_leaf_node(&mut scan, finished)?;
                    out.push(scan);
                } else {
                    ensure!(current_index.is_none(), "index id without a scan in progress");
                }

                current_index = Some(tag.index());
                let (leaf, tightness) =
                    self.make_leaf_node(index, tag.position(), &root.children()[cur_child])?;
                current_scan = Some(leaf);

                if tightness == BoundsTightness::Exact && !in_array_operator {
                    // Inside an array operator the predicate stays: the
                    // operator re-checks per array element.
                    root.take_child(cur_child);
                } else if tightness == BoundsTightness::InexactCovered && !index.multikey() {
                    let child = root.take_child(cur_child);
                    if let Some(scan) = current_scan.as_mut() {
                        add_filter_to_node(scan, child, combine);
                    }
                } else if combine == CombineKind::Or {
                    if let Some(mut scan) = current_scan.take() {
                        self.finish_leaf_node(&mut scan, index)?;
                        let child = root.take_child(cur_child);
                        out.push(PlanNode::Fetch(FetchNode {
                            filter: Some(child),
                            child: Box::new(scan),
                        }));
                    }
                    current_index = None;
                } else {
                    cur_child += 1;
                }
            }
        }

        if let Some(mut scan) = current_scan.take() {
            let index = match current_index {
                Some(i) => &self.indices[i],
                None => bail!("scan in progress without an index"),
            };
            self.finish_leaf_node(&mut scan, index)?;
            out.push(scan);
        }

        Ok(Some(out))
    }

    /// The merge-or-start step for one tagged predicate pulled from inside
    /// an elemMatch. AND-only, and the predicate is never detached from its
    /// elemMatch parent; covered filters are attached as clones.
    fn assemble_elem_match_predicate(
        &self,
        em_child: &MatchExpression,
        current_scan: &mut Option<PlanNode>,
        current_index: &mut Option<usize>,
        out: &mut Vec<PlanNode>,
    ) -> Result<()> {
        let tag = match em_child.tag().copied() {
            Some(tag) => tag,
            None => bail!("untagged predicate inside a tagged elemMatch"),
        };
        ensure!(
            tag.index() < self.indices.len(),
            "index tag {} outside the catalog",
            tag
        );
        let index = &self.indices[tag.index()];

        let mut do_merge = false;
        if *current_index == Some(tag.index()) {
            if let Some(scan) = current_scan.as_ref() {
                do_merge =
                    should_merge_with_leaf(em_child, index, tag.position(), scan, CombineKind::And);
            }
        }

        if do_merge {
            let tightness = match current_scan.as_mut() {
                Some(scan) => self.merge_with_leaf_node(
                    em_child,
                    index,
                    tag.position(),
                    scan,
                    CombineKind::And,
                )?,
                None => bail!("merge without a scan in progress"),
            };
            if tightness == BoundsTightness::InexactCovered && !index.multikey() {
                // The fetch above re-checks the whole elemMatch anyway;
                // this copy only prunes rows during the scan.
                if let Some(scan) = current_scan.as_mut() {
                    add_filter_to_node(scan, em_child.clone(), CombineKind::And);
                }
            }
        } else {
            if let Some(mut scan) = current_scan.take() {
                let finished = match *current_index {
                    Some(i) => &self.indices[i],
                    None => bail!("scan in progress without an index"),
                };
                self.finish_leaf_node(&mut scan, finished)?;
                out.push(scan);
            } else {
                ensure!(current_index.is_none(), "index id without a scan in progress");
            }

            *current_index = Some(tag.index());
            let (leaf, tightness) = self.make_leaf_node(index, tag.position(), em_child)?;
            *current_scan = Some(leaf);
            if tightness == BoundsTightness::InexactCovered && !index.multikey() {
                if let Some(scan) = current_scan.as_mut() {
                    add_filter_to_node(scan, em_child.clone(), CombineKind::And);
                }
            }
        }
        Ok(())
    }

    /// Builds a scan leaf for one tagged predicate against key field
    /// `position` of `index`, reporting bounds tightness.
    ///
    /// The predicate's path may differ from the key field's name when an
    /// array operator above provides a path prefix.
    fn make_leaf_node(
        &self,
        index: &IndexEntry,
        position: usize,
        expr: &MatchExpression,
    ) -> Result<(PlanNode, BoundsTightness)> {
        let index_is_2d = index.key_pattern().first().map(|c| c.kind()) == Some(KeyKind::Geo2d);

        if let MatchKind::GeoNear(near) = expr.kind() {
            // 2d proximity queries carry a hard limit and are filtered out
            // before access planning.
            ensure!(!index_is_2d, "near predicate assigned to a 2d index");
            let mut base_bounds = IndexBounds::with_field_count(index.key_pattern().len());
            // Name the near field now; the near stage owns its traversal,
            // so leaf finishing must not fill this field with all-values.
            if let Some(component) = index.key_pattern().component(position) {
                base_bounds.fields[position].name = component.name().to_string();
            }
            let (add_point_meta, add_distance_meta) = match self.query.projection() {
                Some(projection) => (
                    projection.wants_near_point(),
                    projection.wants_near_distance(),
                ),
                None => (false, false),
            };
            let node = PlanNode::GeoNear2dSphere(GeoNear2dSphereNode {
                key_pattern: index.key_pattern().clone(),
                near: near.clone(),
                base_bounds,
                filter: None,
                add_point_meta,
                add_distance_meta,
            });
            return Ok((node, BoundsTightness::Exact));
        }

        if index_is_2d {
            let MatchKind::Geo(geo) = expr.kind() else {
                bail!(
                    "only geo predicates can use a 2d index, got {}",
                    expr.kind().name()
                );
            };
            let node = PlanNode::Geo2d(Geo2dNode {
                key_pattern: index.key_pattern().clone(),
                geo: geo.clone(),
                filter: None,
            });
            return Ok((node, BoundsTightness::Exact));
        }

        if let MatchKind::TextSearch(search) = expr.kind() {
            let node = PlanNode::TextMatch(TextNode {
                key_pattern: index.key_pattern().clone(),
                search: search.clone(),
                index_prefix: None,
                filter: None,
            });
            return Ok((node, BoundsTightness::Exact));
        }

        let mut bounds = IndexBounds::with_field_count(index.key_pattern().len());
        let key = match index.key_pattern().component(position) {
            Some(component) => component,
            None => bail!(
                "tag position {} outside key pattern {}",
                position,
                index.key_pattern()
            ),
        };
        let tightness = builder::translate(expr, key, index, &mut bounds.fields[position])?;
        let node = PlanNode::IndexScan(IndexScanNode {
            key_pattern: index.key_pattern().clone(),
            multikey: index.multikey(),
            bounds,
            direction: ScanDirection::Forward,
            filter: None,
            max_scan: self.query.parsed().max_scan(),
            add_key_metadata: self.query.parsed().return_key(),
        });
        Ok((node, tightness))
    }

    /// Folds one more predicate into an existing scan leaf, combining
    /// bounds on the tagged key field.
    fn merge_with_leaf_node(
        &self,
        expr: &MatchExpression,
        index: &IndexEntry,
        position: usize,
        node: &mut PlanNode,
        combine: CombineKind,
    ) -> Result<BoundsTightness> {
        let bounds = match node {
            PlanNode::Geo2d(_) => return Ok(BoundsTightness::InexactFetch),
            // Text covering is unlike any other covering; the prefix
            // equalities are resolved when the leaf is finished.
            PlanNode::TextMatch(_) => return Ok(BoundsTightness::InexactCovered),
            PlanNode::GeoNear2dSphere(n) => &mut n.base_bounds,
            PlanNode::IndexScan(n) => &mut n.bounds,
            other => bail!("cannot merge a predicate into {}", other),
        };

        let key = match index.key_pattern().component(position) {
            Some(component) => component,
            None => bail!(
                "tag position {} outside key pattern {}",
                position,
                index.key_pattern()
            ),
        };
        ensure!(
            bounds.fields.len() > position,
            "scan bounds narrower than tag position {}",
            position
        );

        let field = &mut bounds.fields[position];
        if field.is_unfilled() {
            builder::translate(expr, key, index, field)
        } else {
            match combine {
                CombineKind::And => builder::translate_and_intersect(expr, key, index, field),
                CombineKind::Or => builder::translate_and_union(expr, key, index, field),
            }
        }
    }

    /// Finalizes a completed scan leaf: fills all-values bounds for
    /// unconstrained key fields, aligns bounds to the index's per-field
    /// directions, and assembles text prefix keys.
    fn finish_leaf_node(&self, node: &mut PlanNode, index: &IndexEntry) -> Result<()> {
        let bounds = match node {
            PlanNode::Geo2d(_) => return Ok(()),
            PlanNode::TextMatch(_) => return self.finish_text_node(node, index),
            PlanNode::GeoNear2dSphere(n) => &mut n.base_bounds,
            PlanNode::IndexScan(n) => &mut n.bounds,
            other => bail!("cannot finish {} as a scan leaf", other),
        };

        let key_pattern = index.key_pattern();
        ensure!(
            bounds.fields.len() == key_pattern.len(),
            "{} bound fields for key pattern {}",
            bounds.fields.len(),
            key_pattern
        );

        for (i, field) in bounds.fields.iter_mut().enumerate() {
            if field.is_unfilled() {
                ensure!(
                    field.intervals.is_empty(),
                    "unnamed interval list carries intervals"
                );
                if let Some(component) = key_pattern.component(i) {
                    builder::all_values_for_field(component, field);
                }
            }
        }

        // Bounds were built for a forward traversal of each field.
        builder::align_bounds(bounds, key_pattern);
        Ok(())
    }

    /// Builds the text leaf's index prefix out of the equality predicates
    /// collected on its filter, one per prefix key field, in key order.
    fn finish_text_node(&self, node: &mut PlanNode, index: &IndexEntry) -> Result<()> {
        let text = match node {
            PlanNode::TextMatch(n) => n,
            other => bail!("{} is not a text leaf", other),
        };
        let prefix_end = match index.key_pattern().text_position() {
            Some(position) => position,
            None => bail!("text leaf over an index without a text column"),
        };
        // No prefix fields: any filter already on the node stays there.
        if prefix_end == 0 {
            return Ok(());
        }

        // A text scan needs an equality over every prefix field; they were
        // merged into the filter on the way here.
        let mut filter = match text.filter.take() {
            Some(filter) => filter,
            None => bail!("text index prefix fields without equality predicates"),
        };

        let mut slots: Vec<Option<MatchExpression>> = (0..prefix_end).map(|_| None).collect();
        let remainder = if matches!(filter.kind(), MatchKind::And) {
            let children = std::mem::take(filter.children_mut());
            let mut kept = Vec::new();
            for child in children {
                match child.tag().map(|t| t.position()) {
                    Some(position) if position < prefix_end => slots[position] = Some(child),
                    Some(_) => kept.push(child),
                    None => bail!("untagged clause in a text leaf filter"),
                }
            }
            filter.children_mut().extend(kept);
            match filter.num_children() {
                0 => None,
                // An AND of one thing is that thing.
                1 => Some(filter.take_child(0)),
                _ => Some(filter),
            }
        } else {
            ensure!(
                prefix_end == 1,
                "one equality collected for {} text prefix fields",
                prefix_end
            );
            slots[0] = Some(filter);
            None
        };

        let mut prefix_fields = Vec::with_capacity(prefix_end);
        for slot in slots {
            let expr = match slot {
                Some(expr) => expr,
                None => bail!("missing equality over a text index prefix field"),
            };
            let MatchKind::Eq(value) = expr.kind() else {
                bail!("non-equality predicate over a text index prefix field");
            };
            prefix_fields.push((expr.path().to_string(), value.clone()));
        }
        text.index_prefix = Some(Value::Object(prefix_fields));
        text.filter = remainder;
        Ok(())
    }

    /// A plan that scans the whole collection and filters.
    pub fn make_collection_scan(&self, tailable: bool) -> PlanNode {
        let parsed = self.query.parsed();
        // {$natural: 1} in the sort steers direction; a $natural hint wins.
        let mut direction = ScanDirection::Forward;
        if let Some(natural) = parsed.natural_sort() {
            direction = natural;
        }
        if let Some(natural) = parsed.natural_hint() {
            direction = natural;
        }
        let filter = if self.query.root().is_empty_and() {
            None
        } else {
            Some(self.query.root().clone())
        };
        PlanNode::CollectionScan(CollectionScanNode {
            ns: self.query.ns().to_string(),
            filter,
            direction,
            max_scan: parsed.max_scan(),
            tailable,
        })
    }

    /// A plan that scans `index` end to end, fetching and filtering unless
    /// the query has no predicate.
    pub fn scan_whole_index(&self, index: &IndexEntry, direction: ScanDirection) -> PlanNode {
        let mut bounds = IndexBounds::default();
        builder::all_values_bounds(index.key_pattern(), &mut bounds);
        let mut scan = PlanNode::IndexScan(IndexScanNode {
            key_pattern: index.key_pattern().clone(),
            multikey: index.multikey(),
            bounds,
            direction: ScanDirection::Forward,
            filter: None,
            max_scan: self.query.parsed().max_scan(),
            add_key_metadata: self.query.parsed().return_key(),
        });
        if direction == ScanDirection::Backward {
            scan.reverse_scans();
        }
        self.fetch_unless_trivial_filter(scan)
    }

    /// A plan that scans `index` over the raw key range
    /// `[start_key, end_key)`, fetching and filtering unless the query has
    /// no predicate.
    pub fn make_index_scan(
        &self,
        index: &IndexEntry,
        start_key: Value,
        end_key: Value,
    ) -> PlanNode {
        let bounds = IndexBounds {
            fields: Vec::new(),
            simple_range: Some(SimpleRange {
                start_key,
                end_key,
                end_key_inclusive: false,
            }),
        };
        let scan = PlanNode::IndexScan(IndexScanNode {
            key_pattern: index.key_pattern().clone(),
            multikey: index.multikey(),
            bounds,
            direction: ScanDirection::Forward,
            filter: None,
            max_scan: self.query.parsed().max_scan(),
            add_key_metadata: self.query.parsed().return_key(),
        });
        self.fetch_unless_trivial_filter(scan)
    }

    fn fetch_unless_trivial_filter(&self, scan: PlanNode) -> PlanNode {
        if self.query.root().is_empty_and() {
            return scan;
        }
        PlanNode::Fetch(FetchNode {
            filter: Some(self.query.root().clone()),
            child: Box::new(scan),
        })
    }
}

/// Reorders `children` so text-producing scans come first, preserving the
/// relative order of everything else.
fn stable_partition_text_first(children: &mut Vec<PlanNode>) {
    let (texts, others): (Vec<_>, Vec<_>) = children.drain(..).partition(PlanNode::is_text);
    children.extend(texts);
    children.extend(others);
}

/// Decides whether one more predicate can fold into an existing scan leaf.
///
/// Geo and text leaves always accept (the predicate feeds their compounded
/// prefix). An index scan accepts compounding into an unfilled field; on an
/// already-filled field, intersection is refused for multikey indexes and
/// union is always sound.
fn should_merge_with_leaf(
    _expr: &MatchExpression,
    index: &IndexEntry,
    position: usize,
    node: &PlanNode,
    combine: CombineKind,
) -> bool {
    match node {
        PlanNode::TextMatch(_) | PlanNode::Geo2d(_) | PlanNode::GeoNear2dSphere(_) => true,
        PlanNode::IndexScan(scan) => match scan.bounds.fields.get(position) {
            Some(field) if field.is_unfilled() => true,
            Some(_) => match combine {
                CombineKind::And => !index.multikey(),
                CombineKind::Or => true,
            },
            None => false,
        },
        _ => false,
    }
}

/// Collects tagged predicates usable on their own field from inside an
/// elemMatch subtree, looking through nested ANDs and elemMatches. The
/// originals stay attached; callers get clones.
fn find_elem_match_children(node: &MatchExpression, out: &mut Vec<MatchExpression>) {
    for child in node.children() {
        if indexability::node_can_use_index_on_own_field(child) && child.tag().is_some() {
            out.push(child.clone());
        } else if matches!(child.kind(), MatchKind::And | MatchKind::ElemMatchObject) {
            find_elem_match_children(child, out);
        }
    }
}

/// Attaches `expr` as one more clause of `node`'s filter, combining with
/// the existing filter under `combine`.
fn add_filter_to_node(node: &mut PlanNode, expr: MatchExpression, combine: CombineKind) {
    let slot = match node.filter_mut() {
        Some(slot) => slot,
        None => return,
    };
    match slot.take() {
        None => *slot = Some(expr),
        Some(mut existing) => {
            let same_kind = matches!(
                (existing.kind(), combine),
                (MatchKind::And, CombineKind::And) | (MatchKind::Or, CombineKind::Or)
            );
            if same_kind {
                existing.add_child(expr);
                *slot = Some(existing);
            } else {
                let combined = match combine {
                    CombineKind::And => MatchExpression::and(vec![existing, expr]),
                    CombineKind::Or => MatchExpression::or(vec![existing, expr]),
                };
                *slot = Some(combined);
            }
        }
    }
}
