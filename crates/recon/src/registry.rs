//! Equivalence registry: union-find over every ASN observed in a run.
//!
//! Union by size with path compression. Each root also carries the smallest
//! ASN of its class (the representative) and the class member list, merged
//! small-into-large so `members_of` never goes stale.

use std::collections::{BTreeMap, HashMap};

use crate::model::{Asn, Group};

#[derive(Debug, Clone, Default)]
pub struct EquivalenceRegistry {
    index: HashMap<Asn, usize>,
    asns: Vec<Asn>,
    parent: Vec<usize>,
    size: Vec<usize>,
    /// Smallest ASN in the class. Valid at roots only.
    min: Vec<Asn>,
    /// Member slots of the class. Valid at roots only.
    members: Vec<Vec<usize>>,
}

impl EquivalenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `asn`, creating a singleton class on first sight.
    fn slot(&mut self, asn: Asn) -> usize {
        if let Some(&i) = self.index.get(&asn) {
            return i;
        }
        let i = self.asns.len();
        self.index.insert(asn, i);
        self.asns.push(asn);
        self.parent.push(i);
        self.size.push(1);
        self.min.push(asn);
        self.members.push(vec![i]);
        i
    }

    fn root(&mut self, mut i: usize) -> usize {
        let mut r = i;
        while self.parent[r] != r {
            r = self.parent[r];
        }
        while self.parent[i] != r {
            let next = self.parent[i];
            self.parent[i] = r;
            i = next;
        }
        r
    }

    /// Read-only root lookup (no compression).
    fn root_of(&self, mut i: usize) -> usize {
        while self.parent[i] != i {
            i = self.parent[i];
        }
        i
    }

    /// Representative (smallest ASN) of `asn`'s class. Unseen ASNs become
    /// singletons first.
    pub fn find(&mut self, asn: Asn) -> Asn {
        let i = self.slot(asn);
        let r = self.root(i);
        self.min[r]
    }

    /// Representative of `asn` if it has been seen, without mutating.
    pub fn representative_of(&self, asn: Asn) -> Option<Asn> {
        self.index.get(&asn).map(|&i| self.min[self.root_of(i)])
    }

    /// Merge the classes of `a` and `b`. Returns true if two distinct
    /// classes were joined, false if they already were one.
    pub fn union(&mut self, a: Asn, b: Asn) -> bool {
        let ia = self.slot(a);
        let ib = self.slot(b);
        let ra = self.root(ia);
        let rb = self.root(ib);
        if ra == rb {
            return false;
        }

        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        self.min[big] = self.min[big].min(self.min[small]);
        let moved = std::mem::take(&mut self.members[small]);
        self.members[big].extend(moved);
        true
    }

    /// Union every member with `anchor`. Linear in the number of members.
    pub fn union_all<I>(&mut self, anchor: Asn, members: I) -> usize
    where
        I: IntoIterator<Item = Asn>,
    {
        self.slot(anchor);
        members
            .into_iter()
            .filter(|&m| self.union(anchor, m))
            .count()
    }

    pub fn same_class(&mut self, a: Asn, b: Asn) -> bool {
        self.find(a) == self.find(b)
    }

    /// Current members of `asn`'s class, sorted.
    pub fn members_of(&mut self, asn: Asn) -> Group {
        let i = self.slot(asn);
        let r = self.root(i);
        self.members[r].iter().map(|&m| self.asns[m]).collect()
    }

    pub fn contains(&self, asn: Asn) -> bool {
        self.index.contains_key(&asn)
    }

    /// Number of distinct ASNs observed.
    pub fn len(&self) -> usize {
        self.asns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asns.is_empty()
    }

    pub fn class_count(&self) -> usize {
        (0..self.parent.len()).filter(|&i| self.parent[i] == i).count()
    }

    /// Representatives of all classes, ascending.
    pub fn representatives(&self) -> Vec<Asn> {
        let mut reps: Vec<Asn> = (0..self.parent.len())
            .filter(|&i| self.parent[i] == i)
            .map(|i| self.min[i])
            .collect();
        reps.sort_unstable();
        reps
    }

    /// The quotient: representative -> full class.
    pub fn classes(&self) -> BTreeMap<Asn, Group> {
        (0..self.parent.len())
            .filter(|&i| self.parent[i] == i)
            .map(|r| {
                let group: Group = self.members[r].iter().map(|&m| self.asns[m]).collect();
                (self.min[r], group)
            })
            .collect()
    }
}
